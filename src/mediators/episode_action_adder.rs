use errors::*;
use mediators::common;
use mediators::device_registrar;
use model;
use model::insertable;
use model::ActionKind;
use schema;
use time_helpers;
use url_sanitizer;
use url_sanitizer::UrlRewrite;

use chrono::{DateTime, Utc};
use diesel;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use slog::Logger;
use std::collections::HashMap;

/// Appends a batch of episode actions uploaded by a client.
///
/// The whole batch is validated before anything is written, and either every
/// action is stored or none are. Podcasts, episodes, and devices that are
/// mentioned for the first time are created on the fly; a podcast created
/// this way starts out unsubscribed.
pub struct Mediator<'a> {
    pub actions:  &'a [EpisodeActionInput],
    pub conn:     &'a PgConnection,
    pub username: &'a str,
}

impl<'a> Mediator<'a> {
    pub fn run(&mut self, log: &Logger) -> Result<RunResult> {
        time_helpers::log_timed(&log.new(o!("step" => file!())), |log| {
            self.conn.transaction::<_, Error, _>(|| self.run_inner(log))
        })
    }

    fn run_inner(&mut self, log: &Logger) -> Result<RunResult> {
        let mut update_urls = Vec::new();
        let actions = self.actions;
        let validated = actions
            .iter()
            .map(|a| ValidatedAction::new(a, &mut update_urls))
            .collect::<Result<Vec<_>>>()?;

        let user = common::load_user(log, self.conn, self.username)?;

        // Batches tend to repeat the same device and podcast many times over
        let mut devices: HashMap<&str, i64> = HashMap::new();
        let mut podcasts: HashMap<&str, model::Podcast> = HashMap::new();

        let mut ins_actions = Vec::with_capacity(validated.len());
        for action in &validated {
            let device_id = match action.input.device {
                Some(ref name) => {
                    if !devices.contains_key(name.as_str()) {
                        let res = device_registrar::Mediator {
                            conn: self.conn,
                            name,
                            user: &user,
                        }.run(log)?;
                        devices.insert(name.as_str(), res.device.id);
                    }
                    devices.get(name.as_str()).cloned()
                }
                None => None,
            };

            if !podcasts.contains_key(action.podcast.as_str()) {
                let podcast =
                    common::find_or_create_podcast(log, self.conn, &user, &action.podcast)?;
                podcasts.insert(action.podcast.as_str(), podcast);
            }
            let podcast = &podcasts[action.podcast.as_str()];

            let episode = common::find_or_create_episode(
                log,
                self.conn,
                podcast,
                &action.episode,
                action.input.guid.as_ref().map(|g| g.as_str()),
            )?;

            ins_actions.push(insertable::EpisodeAction {
                action: action.kind.as_str().to_owned(),
                device_id,
                episode_id: episode.id,
                occurred_at: action.input.timestamp,
                podcast_id: podcast.id,
                position: action.input.position,
                started: action.input.started,
                total: action.input.total,
            });
        }

        let actions = self.insert_actions(log, &ins_actions)?;
        info!(log, "Added episode actions"; "num_actions" => actions.len());

        Ok(RunResult {
            actions,
            update_urls,
        })
    }

    //
    // Steps
    //

    fn insert_actions(
        &mut self,
        log: &Logger,
        ins_actions: &[insertable::EpisodeAction],
    ) -> Result<Vec<model::EpisodeAction>> {
        if ins_actions.is_empty() {
            return Ok(vec![]);
        }

        time_helpers::log_timed(&log.new(o!("step" => "insert_actions")), |_log| {
            diesel::insert_into(schema::episode_actions::table)
                .values(ins_actions)
                .get_results(self.conn)
                .chain_err(|| "Error inserting episode actions")
        })
    }
}

/// An episode action as received from a client.
#[derive(Clone, Debug)]
pub struct EpisodeActionInput {
    pub action:    String,
    pub device:    Option<String>,
    pub episode:   String,
    pub guid:      Option<String>,
    pub podcast:   String,
    pub position:  Option<i64>,
    pub started:   Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub total:     Option<i64>,
}

pub struct RunResult {
    pub actions:     Vec<model::EpisodeAction>,
    pub update_urls: Vec<UrlRewrite>,
}

//
// Private types
//

struct ValidatedAction<'a> {
    episode: String,
    input:   &'a EpisodeActionInput,
    kind:    ActionKind,
    podcast: String,
}

impl<'a> ValidatedAction<'a> {
    fn new(
        input: &'a EpisodeActionInput,
        update_urls: &mut Vec<UrlRewrite>,
    ) -> Result<ValidatedAction<'a>> {
        let kind = input.action.parse::<ActionKind>()?;

        let fields = [
            ("started", input.started),
            ("position", input.position),
            ("total", input.total),
        ];
        for &(name, value) in &fields {
            match value {
                Some(_) if kind != ActionKind::Play => bail!(user_errors::validation(format!(
                    "Field \"{}\" may only be set for \"play\" actions.",
                    name
                ))),
                Some(n) if n < 0 => bail!(user_errors::validation(format!(
                    "Field \"{}\" must not be negative.",
                    name
                ))),
                _ => (),
            }
        }

        if let Some(ref device) = input.device {
            common::validate_name("device", device)?;
        }

        let podcast = match url_sanitizer::sanitize_tracked(&input.podcast, update_urls) {
            Some(url) => url,
            None => bail!(user_errors::validation(format!(
                "Invalid podcast URL \"{}\".",
                input.podcast
            ))),
        };

        let episode = match url_sanitizer::sanitize_tracked(&input.episode, update_urls) {
            Some(url) => url,
            None => bail!(user_errors::validation(format!(
                "Invalid episode URL \"{}\".",
                input.episode
            ))),
        };

        Ok(ValidatedAction {
            episode,
            input,
            kind,
            podcast,
        })
    }
}

//
// Tests
//
