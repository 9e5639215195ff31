use errors::*;
use mediators::common;
use mediators::settings_getter;
use mediators::settings_key_resolver;
use mediators::settings_key_resolver::{ResolvedSettingsKey, SettingsKey};
use schema;
use time_helpers;

use diesel;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Nullable, Text};
use slog::Logger;
use std::collections::BTreeMap;

/// Writes and removes settings under one key, all in one transaction.
///
/// Setting a key to an empty value is the same as removing it.
pub struct Mediator<'a> {
    pub conn:     &'a PgConnection,
    pub key:      SettingsKey<'a>,
    pub remove:   &'a [String],
    pub set:      &'a BTreeMap<String, String>,
    pub username: &'a str,
}

impl<'a> Mediator<'a> {
    pub fn run(&mut self, log: &Logger) -> Result<RunResult> {
        time_helpers::log_timed(&log.new(o!("step" => file!())), |log| {
            self.conn.transaction::<_, Error, _>(|| self.run_inner(log))
        })
    }

    fn run_inner(&mut self, log: &Logger) -> Result<RunResult> {
        self.validate()?;

        let user = common::load_user(log, self.conn, self.username)?;
        let resolved = settings_key_resolver::Mediator {
            conn: self.conn,
            key:  self.key,
            user: &user,
        }.run(log)?
            .resolved;

        let (remove, set) = (self.remove, self.set);
        for (key, value) in set.iter() {
            if value.is_empty() {
                self.delete_setting(log, user.id, &resolved, key)?;
            } else {
                self.upsert_setting(log, user.id, &resolved, key, value)?;
            }
        }

        for key in remove {
            self.delete_setting(log, user.id, &resolved, key)?;
        }

        let settings = settings_getter::load_settings(log, self.conn, user.id, &resolved)?;
        Ok(RunResult { settings })
    }

    //
    // Steps
    //

    fn delete_setting(
        &mut self,
        log: &Logger,
        user_id: i64,
        resolved: &ResolvedSettingsKey,
        key: &str,
    ) -> Result<usize> {
        time_helpers::log_timed(&log.new(o!("step" => "delete_setting")), |_log| {
            let mut query = diesel::delete(schema::settings::table)
                .filter(schema::settings::user_id.eq(user_id))
                .filter(schema::settings::scope.eq(resolved.scope().as_str()))
                .filter(schema::settings::key.eq(key))
                .into_boxed();

            query = match resolved.device_id() {
                Some(id) => query.filter(schema::settings::device_id.eq(id)),
                None => query.filter(schema::settings::device_id.is_null()),
            };
            query = match resolved.podcast_id() {
                Some(id) => query.filter(schema::settings::podcast_id.eq(id)),
                None => query.filter(schema::settings::podcast_id.is_null()),
            };
            query = match resolved.episode_id() {
                Some(id) => query.filter(schema::settings::episode_id.eq(id)),
                None => query.filter(schema::settings::episode_id.is_null()),
            };

            query
                .execute(self.conn)
                .chain_err(|| "Error deleting setting")
        })
    }

    // The conflict target has to name the expressions of the unique index
    // exactly, which the query builder can't express.
    fn upsert_setting(
        &mut self,
        log: &Logger,
        user_id: i64,
        resolved: &ResolvedSettingsKey,
        key: &str,
        value: &str,
    ) -> Result<usize> {
        time_helpers::log_timed(&log.new(o!("step" => "upsert_setting")), |_log| {
            diesel::sql_query(include_str!("../sql/settings_saver_upsert.sql"))
                .bind::<Nullable<BigInt>, _>(resolved.device_id())
                .bind::<Nullable<BigInt>, _>(resolved.episode_id())
                .bind::<Text, _>(key)
                .bind::<Nullable<BigInt>, _>(resolved.podcast_id())
                .bind::<Text, _>(resolved.scope().as_str())
                .bind::<BigInt, _>(user_id)
                .bind::<Text, _>(value)
                .execute(self.conn)
                .chain_err(|| "Error upserting setting")
        })
    }

    //
    // Private functions
    //

    fn validate(&self) -> Result<()> {
        if self.set.keys().chain(self.remove.iter()).any(|k| k.is_empty()) {
            bail!(user_errors::validation("Setting keys must not be empty."));
        }

        if let Some(key) = self.remove.iter().find(|k| self.set.contains_key(*k)) {
            bail!(user_errors::validation(format!(
                "Setting \"{}\" can't be both set and removed.",
                key
            )));
        }

        Ok(())
    }
}

pub struct RunResult {
    /// Every setting under the key after the write.
    pub settings: BTreeMap<String, String>,
}

//
// Tests
//
