use errors::*;
use mediators::common;
use mediators::device_registrar;
use model;
use schema;
use time_helpers;
use url_sanitizer;
use url_sanitizer::UrlRewrite;

use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use slog::Logger;
use std::collections::HashMap;

/// Replaces an account's full set of subscriptions with the one uploaded by a
/// device.
///
/// Subscriptions are account-wide, so the device only matters in that it's
/// registered if it hasn't been seen before. Podcasts only get written if
/// their subscription state actually changes, which leaves `updated_at` alone
/// for everything else and keeps the diffs that other devices pull minimal.
pub struct Mediator<'a> {
    pub conn:      &'a PgConnection,
    pub device:    &'a str,
    pub timestamp: DateTime<Utc>,
    pub urls:      &'a [String],
    pub username:  &'a str,
}

impl<'a> Mediator<'a> {
    pub fn run(&mut self, log: &Logger) -> Result<RunResult> {
        time_helpers::log_timed(&log.new(o!("step" => file!())), |log| {
            self.conn.transaction::<_, Error, _>(|| self.run_inner(log))
        })
    }

    fn run_inner(&mut self, log: &Logger) -> Result<RunResult> {
        common::validate_name("device", self.device)?;

        let mut update_urls = Vec::new();
        let urls = url_sanitizer::sanitize_all(self.urls, &mut update_urls);

        let user = common::load_user(log, self.conn, self.username)?;
        device_registrar::Mediator {
            conn: self.conn,
            name: self.device,
            user: &user,
        }.run(log)?;

        let mut podcasts = self.select_podcasts(log, &user)?
            .into_iter()
            .map(|p| (p.url.clone(), p))
            .collect::<HashMap<_, _>>();

        let mut unsubscribed = Vec::new();
        for podcast in podcasts.values_mut() {
            if urls.contains(&podcast.url) {
                continue;
            }

            if podcast.set_unsubscribed(self.timestamp) {
                unsubscribed.push(common::update_podcast_subscription(
                    log,
                    self.conn,
                    podcast,
                )?);
            }
        }

        let mut subscribed = Vec::new();
        for url in &urls {
            let mut podcast = match podcasts.remove(url) {
                Some(podcast) => podcast,
                None => common::find_or_create_podcast(log, self.conn, &user, url)?,
            };

            if podcast.set_subscribed(self.timestamp) {
                subscribed.push(common::update_podcast_subscription(
                    log,
                    self.conn,
                    &podcast,
                )?);
            }
        }

        info!(log, "Replaced subscriptions";
            "num_subscribed" => subscribed.len(), "num_unsubscribed" => unsubscribed.len());

        Ok(RunResult {
            subscribed,
            timestamp: self.timestamp,
            unsubscribed,
            update_urls,
        })
    }

    //
    // Steps
    //

    fn select_podcasts(&mut self, log: &Logger, user: &model::User) -> Result<Vec<model::Podcast>> {
        time_helpers::log_timed(&log.new(o!("step" => "select_podcasts")), |_log| {
            schema::podcasts::table
                .filter(schema::podcasts::user_id.eq(user.id))
                .order(schema::podcasts::id)
                .load::<model::Podcast>(self.conn)
                .chain_err(|| "Error selecting podcasts")
        })
    }
}

pub struct RunResult {
    /// Podcasts that went from unsubscribed (or nonexistent) to subscribed.
    pub subscribed: Vec<model::Podcast>,

    pub timestamp: DateTime<Utc>,

    /// Podcasts that went from subscribed to unsubscribed.
    pub unsubscribed: Vec<model::Podcast>,

    pub update_urls: Vec<UrlRewrite>,
}

//
// Tests
//
