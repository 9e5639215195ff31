use mediators::common;
use model;
use test_helpers;

use chrono::{DateTime, TimeZone, Utc};
use diesel::pg::PgConnection;
use rand;
use rand::distributions::Alphanumeric;
use rand::Rng;
use slog::Logger;
use std::iter;

pub mod device {
    use mediators::device_registrar;
    use test_data::*;

    #[derive(Default)]
    pub struct Args<'a> {
        pub name: Option<&'a str>,
        pub user: Option<&'a model::User>,
    }

    #[allow(dead_code)]
    pub fn insert(log: &Logger, conn: &PgConnection) -> model::Device {
        insert_args(log, conn, Args::default())
    }

    pub fn insert_args(log: &Logger, conn: &PgConnection, args: Args) -> model::Device {
        let user = if args.user.is_none() {
            Some(super::user::insert(log, conn))
        } else {
            None
        };

        let name = match args.name {
            Some(name) => name.to_owned(),
            None => format!("device-{}", random_string(10)),
        };

        device_registrar::Mediator {
            conn,
            name: &name,
            user: args.user.unwrap_or_else(|| user.as_ref().unwrap()),
        }.run(log)
            .unwrap()
            .device
    }
}

pub mod episode_action {
    use mediators::episode_action_adder;
    use test_data::*;

    #[derive(Default)]
    pub struct Args<'a> {
        pub action:    Option<&'a str>,
        pub device:    Option<&'a str>,
        pub episode:   Option<&'a str>,
        pub guid:      Option<&'a str>,
        pub podcast:   Option<&'a str>,
        pub timestamp: Option<DateTime<Utc>>,
        pub user:      Option<&'a model::User>,
    }

    #[allow(dead_code)]
    pub fn insert(log: &Logger, conn: &PgConnection) -> model::EpisodeAction {
        insert_args(log, conn, Args::default())
    }

    pub fn insert_args(log: &Logger, conn: &PgConnection, args: Args) -> model::EpisodeAction {
        let user = if args.user.is_none() {
            Some(super::user::insert(log, conn))
        } else {
            None
        };

        let actions = [
            episode_action_adder::EpisodeActionInput {
                action:    args.action.unwrap_or("download").to_owned(),
                device:    args.device.map(|d| d.to_owned()),
                episode:   args.episode
                    .unwrap_or("https://example.com/episode-1.mp3")
                    .to_owned(),
                guid:      args.guid.map(|g| g.to_owned()),
                podcast:   args.podcast
                    .unwrap_or("https://example.com/feed.xml")
                    .to_owned(),
                position:  None,
                started:   None,
                timestamp: args.timestamp
                    .unwrap_or_else(|| Utc.timestamp(1_500_000_000, 0)),
                total:     None,
            },
        ];

        episode_action_adder::Mediator {
            actions:  &actions,
            conn,
            username: &args.user.unwrap_or_else(|| user.as_ref().unwrap()).username,
        }.run(log)
            .unwrap()
            .actions
            .remove(0)
    }
}

pub mod podcast {
    use test_data::*;

    #[derive(Default)]
    pub struct Args<'a> {
        pub url:  Option<&'a str>,
        pub user: Option<&'a model::User>,
    }

    #[allow(dead_code)]
    pub fn insert(log: &Logger, conn: &PgConnection) -> model::Podcast {
        insert_args(log, conn, Args::default())
    }

    /// Inserts a subscribed podcast. This goes around the subscription
    /// mediators so that no device gets registered along the way.
    pub fn insert_args(log: &Logger, conn: &PgConnection, args: Args) -> model::Podcast {
        let user = if args.user.is_none() {
            Some(super::user::insert(log, conn))
        } else {
            None
        };

        // Add a little randomness to URLs so that we don't just insert one
        // podcast and update it over and over.
        let url = match args.url {
            Some(url) => url.to_owned(),
            None => format!("https://example.com/feed-{}.xml", random_string(10)),
        };

        let mut podcast = common::find_or_create_podcast(
            log,
            conn,
            args.user.unwrap_or_else(|| user.as_ref().unwrap()),
            &url,
        ).unwrap();

        if podcast.set_subscribed(Utc::now()) {
            podcast = common::update_podcast_subscription(log, conn, &podcast).unwrap();
        }

        podcast
    }
}

pub mod user {
    use mediators::user_creator;
    use test_data::*;

    #[derive(Default)]
    pub struct Args<'a> {
        pub username: Option<&'a str>,
    }

    pub fn insert(log: &Logger, conn: &PgConnection) -> model::User {
        insert_args(log, conn, Args::default())
    }

    pub fn insert_args(log: &Logger, conn: &PgConnection, args: Args) -> model::User {
        let username = match args.username {
            Some(username) => username.to_owned(),
            None => format!("user-{}", random_string(10)),
        };

        user_creator::Mediator {
            conn,
            password: "password123",
            scrypt_log_n: test_helpers::SCRYPT_LOG_N,
            username: &username,
        }.run(log)
            .unwrap()
            .user
    }
}

//
// Private functions
//

fn random_string(n: usize) -> String {
    let mut rng = rand::thread_rng();
    iter::repeat(())
        .map(|()| rng.sample(Alphanumeric))
        .take(n)
        .collect()
}
