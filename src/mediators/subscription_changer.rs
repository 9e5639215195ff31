use errors::*;
use mediators::common;
use mediators::device_registrar;
use model;
use time_helpers;
use url_sanitizer;
use url_sanitizer::UrlRewrite;

use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use slog::Logger;
use std::collections::BTreeSet;

/// Applies an incremental set of subscription changes uploaded by a device.
///
/// Follows the same transition rules as the full replacement in
/// `subscription_replacer`: only podcasts whose state actually changes get
/// written.
pub struct Mediator<'a> {
    pub add:       &'a [String],
    pub conn:      &'a PgConnection,
    pub device:    &'a str,
    pub remove:    &'a [String],
    pub timestamp: DateTime<Utc>,
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
        let add = url_sanitizer::sanitize_all(self.add, &mut update_urls);
        let remove = url_sanitizer::sanitize_all(self.remove, &mut update_urls);
        Self::validate_disjoint(&add, &remove)?;

        let user = common::load_user(log, self.conn, self.username)?;
        device_registrar::Mediator {
            conn: self.conn,
            name: self.device,
            user: &user,
        }.run(log)?;

        let mut subscribed = Vec::new();
        for url in &add {
            let mut podcast = common::find_or_create_podcast(log, self.conn, &user, url)?;
            if podcast.set_subscribed(self.timestamp) {
                subscribed.push(common::update_podcast_subscription(
                    log,
                    self.conn,
                    &podcast,
                )?);
            }
        }

        let mut unsubscribed = Vec::new();
        for url in &remove {
            // Never heard of it, so there's nothing to unsubscribe from
            let mut podcast = match common::find_podcast(log, self.conn, &user, url)? {
                Some(podcast) => podcast,
                None => continue,
            };

            if podcast.set_unsubscribed(self.timestamp) {
                unsubscribed.push(common::update_podcast_subscription(
                    log,
                    self.conn,
                    &podcast,
                )?);
            }
        }

        info!(log, "Applied subscription changes";
            "num_subscribed" => subscribed.len(), "num_unsubscribed" => unsubscribed.len());

        Ok(RunResult {
            subscribed,
            timestamp: self.timestamp,
            unsubscribed,
            update_urls,
        })
    }

    //
    // Private functions
    //

    // Compared after sanitization so that two spellings of the same feed can't
    // sneak past.
    fn validate_disjoint(add: &BTreeSet<String>, remove: &BTreeSet<String>) -> Result<()> {
        if let Some(url) = add.intersection(remove).next() {
            bail!(user_errors::validation(format!(
                "URL \"{}\" can't be both added and removed.",
                url
            )));
        }

        Ok(())
    }
}

pub struct RunResult {
    pub subscribed:   Vec<model::Podcast>,
    pub timestamp:    DateTime<Utc>,
    pub unsubscribed: Vec<model::Podcast>,
    pub update_urls:  Vec<UrlRewrite>,
}

//
// Tests
//
