use errors::*;
use mediators::common;
use model;
use schema;
use time_helpers;

use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use slog::Logger;

/// Produces the subscription diff that a device should apply to catch up with
/// the account's state.
///
/// Without `since`, the full current state is returned as additions. With it,
/// every podcast whose subscription state changed after `since` is reported
/// on whichever side matches where it ended up. The returned `timestamp` is
/// what the device should send as `since` next time.
pub struct Mediator<'a> {
    pub conn:     &'a PgConnection,
    pub device:   &'a str,
    pub since:    Option<DateTime<Utc>>,
    pub username: &'a str,
}

impl<'a> Mediator<'a> {
    pub fn run(&mut self, log: &Logger) -> Result<RunResult> {
        time_helpers::log_timed(&log.new(o!("step" => file!())), |log| {
            self.conn.transaction::<_, Error, _>(|| self.run_inner(log))
        })
    }

    fn run_inner(&mut self, log: &Logger) -> Result<RunResult> {
        // Taken before reading so that anything committed while we're working
        // is picked up by the next sync instead of being lost.
        let timestamp = Utc::now();

        let user = common::load_user(log, self.conn, self.username)?;
        common::load_device(log, self.conn, &user, self.device)?;

        let (added, removed) = self.select_podcasts(log, &user)?
            .into_iter()
            .partition::<Vec<_>, _>(|p| p.subscribed);

        Ok(RunResult {
            added,
            removed,
            timestamp,
        })
    }

    //
    // Steps
    //

    fn select_podcasts(&mut self, log: &Logger, user: &model::User) -> Result<Vec<model::Podcast>> {
        time_helpers::log_timed(&log.new(o!("step" => "select_podcasts")), |_log| {
            let mut query = schema::podcasts::table
                .filter(schema::podcasts::user_id.eq(user.id))
                .into_boxed();

            query = match self.since {
                Some(since) => query.filter(schema::podcasts::updated_at.gt(since)),
                None => query.filter(schema::podcasts::subscribed.eq(true)),
            };

            query
                .order(schema::podcasts::id)
                .load::<model::Podcast>(self.conn)
                .chain_err(|| "Error selecting podcasts")
        })
    }
}

pub struct RunResult {
    pub added:     Vec<model::Podcast>,
    pub removed:   Vec<model::Podcast>,
    pub timestamp: DateTime<Utc>,
}

//
// Tests
//
