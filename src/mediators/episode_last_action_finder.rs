use errors::*;
use mediators::common;
use mediators::episode_action_lister;
use mediators::episode_action_lister::{SortOrder, ViewFilter};
use model::{ActionKind, EpisodeActionView};
use time_helpers;

use diesel::pg::PgConnection;
use diesel::prelude::*;
use slog::Logger;

/// Finds the most recent episode action recorded for any of a podcast's
/// episodes, optionally ignoring deletes.
pub struct Mediator<'a> {
    pub conn:            &'a PgConnection,
    pub exclude_deleted: bool,
    pub podcast:         &'a str,
    pub username:        &'a str,
}

impl<'a> Mediator<'a> {
    pub fn run(&mut self, log: &Logger) -> Result<RunResult> {
        time_helpers::log_timed(&log.new(o!("step" => file!())), |log| {
            self.conn.transaction::<_, Error, _>(|| self.run_inner(log))
        })
    }

    fn run_inner(&mut self, log: &Logger) -> Result<RunResult> {
        let user = common::load_user(log, self.conn, self.username)?;

        let podcast =
            episode_action_lister::find_podcast_by_raw_url(log, self.conn, &user, self.podcast)?;
        let podcast = match podcast {
            Some(podcast) => podcast,
            None => bail!(self.no_data()),
        };

        let exclude_action = if self.exclude_deleted {
            Some(ActionKind::Delete.as_str())
        } else {
            None
        };

        let actions = episode_action_lister::load_views(
            log,
            self.conn,
            &ViewFilter {
                exclude_action,
                limit: Some(1),
                order: Some(SortOrder::Descending),
                podcast_id: Some(podcast.id),
                ..ViewFilter::new(&user)
            },
        )?;

        match actions.into_iter().next() {
            Some(action) => Ok(RunResult { action }),
            None => bail!(self.no_data()),
        }
    }

    fn no_data(&self) -> Error {
        user_errors::no_data(format!("No episode actions for podcast \"{}\".", self.podcast))
    }
}

pub struct RunResult {
    pub action: EpisodeActionView,
}

//
// Tests
//
