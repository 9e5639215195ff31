use errors::*;
use mediators::common;
use mediators::settings_key_resolver;
use mediators::settings_key_resolver::{ResolvedSettingsKey, SettingsKey};
use schema;
use time_helpers;

use diesel::pg::PgConnection;
use diesel::prelude::*;
use slog::Logger;
use std::collections::BTreeMap;

/// Reads the settings stored under one key.
pub struct Mediator<'a> {
    pub conn:     &'a PgConnection,
    pub key:      SettingsKey<'a>,
    pub username: &'a str,
}

impl<'a> Mediator<'a> {
    pub fn run(&mut self, log: &Logger) -> Result<RunResult> {
        time_helpers::log_timed(&log.new(o!("step" => file!())), |log| {
            self.conn.transaction::<_, Error, _>(|| self.run_inner(log))
        })
    }

    fn run_inner(&mut self, log: &Logger) -> Result<RunResult> {
        let user = common::load_user(log, self.conn, self.username)?;
        let resolved = settings_key_resolver::Mediator {
            conn: self.conn,
            key:  self.key,
            user: &user,
        }.run(log)?
            .resolved;

        let settings = load_settings(log, self.conn, user.id, &resolved)?;
        Ok(RunResult { settings })
    }
}

pub struct RunResult {
    pub settings: BTreeMap<String, String>,
}

/// Loads every setting stored under a resolved key.
///
/// Foreign keys that the key's scope doesn't use must be null on the row, so
/// podcast settings never pick up the episode settings stored underneath the
/// same podcast.
pub fn load_settings(
    log: &Logger,
    conn: &PgConnection,
    user_id: i64,
    key: &ResolvedSettingsKey,
) -> Result<BTreeMap<String, String>> {
    let rows = time_helpers::log_timed(&log.new(o!("step" => "load_settings")), |_log| {
        let mut query = schema::settings::table
            .filter(schema::settings::user_id.eq(user_id))
            .filter(schema::settings::scope.eq(key.scope().as_str()))
            .select((schema::settings::key, schema::settings::value))
            .into_boxed();

        query = match key.device_id() {
            Some(id) => query.filter(schema::settings::device_id.eq(id)),
            None => query.filter(schema::settings::device_id.is_null()),
        };
        query = match key.podcast_id() {
            Some(id) => query.filter(schema::settings::podcast_id.eq(id)),
            None => query.filter(schema::settings::podcast_id.is_null()),
        };
        query = match key.episode_id() {
            Some(id) => query.filter(schema::settings::episode_id.eq(id)),
            None => query.filter(schema::settings::episode_id.is_null()),
        };

        query
            .load::<(String, String)>(conn)
            .chain_err(|| "Error selecting settings")
    })?;

    Ok(rows.into_iter().collect())
}

//
// Tests
//

#[cfg(test)]
mod tests {
    use mediators::settings_getter::*;
    use mediators::settings_saver;
    use model;
    use test_data;
    use test_helpers;

    use r2d2::PooledConnection;
    use r2d2_diesel::ConnectionManager;

    #[test]
    fn test_settings_get_empty() {
        let mut bootstrap = TestBootstrap::new();
        let (mut mediator, log) = bootstrap.mediator(SettingsKey::Account);
        let res = mediator.run(&log).unwrap();
        assert!(res.settings.is_empty());
    }

    #[test]
    fn test_settings_get_isolates_scopes() {
        let mut bootstrap = TestBootstrap::new();
        test_data::episode_action::insert_args(
            &bootstrap.log,
            &*bootstrap.conn,
            test_data::episode_action::Args {
                device: Some("phone"),
                episode: Some("http://ex.com/episode-1.mp3"),
                podcast: Some("http://ex.com/feed.xml"),
                user: Some(&bootstrap.user),
                ..Default::default()
            },
        );

        let keys = [
            SettingsKey::Account,
            SettingsKey::Device { device: "phone" },
            SettingsKey::Podcast {
                podcast: "http://ex.com/feed.xml",
            },
            SettingsKey::Episode {
                episode: "http://ex.com/episode-1.mp3",
                podcast: "http://ex.com/feed.xml",
            },
        ];

        for (i, key) in keys.iter().enumerate() {
            bootstrap.save(*key, "k", &format!("v{}", i));
        }

        for (i, key) in keys.iter().enumerate() {
            let (mut mediator, log) = bootstrap.mediator(*key);
            let res = mediator.run(&log).unwrap();

            let mut expected = BTreeMap::new();
            expected.insert("k".to_owned(), format!("v{}", i));
            assert_eq!(expected, res.settings);
        }
    }

    #[test]
    fn test_settings_get_unknown_device() {
        let mut bootstrap = TestBootstrap::new();
        let (mut mediator, log) = bootstrap.mediator(SettingsKey::Device { device: "phone" });
        let e = mediator.run(&log).err().unwrap();
        assert_eq!("Unknown device: \"phone\"", format!("{}", e).as_str());
    }

    //
    // Private types/functions
    //

    struct TestBootstrap {
        conn: PooledConnection<ConnectionManager<PgConnection>>,
        log:  Logger,
        user: model::User,
    }

    impl TestBootstrap {
        fn new() -> TestBootstrap {
            let conn = test_helpers::connection();
            let log = test_helpers::log();

            TestBootstrap {
                user: test_data::user::insert(&log, &*conn),

                // Only move these after filling the above
                conn: conn,
                log:  log,
            }
        }

        fn mediator<'a>(&'a mut self, key: SettingsKey<'a>) -> (Mediator<'a>, Logger) {
            (
                Mediator {
                    conn: &*self.conn,
                    key,
                    username: &self.user.username,
                },
                self.log.clone(),
            )
        }

        fn save(&mut self, key: SettingsKey, name: &str, value: &str) {
            let mut set = BTreeMap::new();
            set.insert(name.to_owned(), value.to_owned());

            settings_saver::Mediator {
                conn: &*self.conn,
                key,
                remove: &[],
                set: &set,
                username: &self.user.username,
            }.run(&self.log)
                .unwrap();
        }
    }
}
