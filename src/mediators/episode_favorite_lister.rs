use errors::*;
use mediators::common;
use mediators::episode_action_lister;
use mediators::episode_action_lister::{SortOrder, ViewFilter};
use model;
use model::{EpisodeActionView, SettingScope};
use schema;
use time_helpers;

use diesel::pg::PgConnection;
use diesel::prelude::*;
use slog::Logger;

/// The episode-scoped setting that marks an episode as a favorite.
pub const FAVORITE_KEY: &str = "is_favorite";

/// Lists an account's favorite episodes, each represented by the latest
/// action recorded for it. Favorites that have never had an action recorded
/// against them are left out.
pub struct Mediator<'a> {
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
        let user = common::load_user(log, self.conn, self.username)?;

        let episode_ids = self.select_favorite_episode_ids(log, &user)?;
        if episode_ids.is_empty() {
            return Ok(RunResult { actions: vec![] });
        }

        let actions = episode_action_lister::load_views(
            log,
            self.conn,
            &ViewFilter {
                episode_ids: Some(episode_ids),
                ..ViewFilter::new(&user)
            },
        )?;

        let mut actions = episode_action_lister::aggregate_latest(actions);
        episode_action_lister::sort_actions(&mut actions, SortOrder::Descending);

        Ok(RunResult { actions })
    }

    //
    // Steps
    //

    fn select_favorite_episode_ids(&mut self, log: &Logger, user: &model::User) -> Result<Vec<i64>> {
        let ids = time_helpers::log_timed(
            &log.new(o!("step" => "select_favorite_episode_ids")),
            |_log| {
                schema::settings::table
                    .filter(schema::settings::user_id.eq(user.id))
                    .filter(schema::settings::scope.eq(SettingScope::Episode.as_str()))
                    .filter(schema::settings::key.eq(FAVORITE_KEY))
                    .filter(schema::settings::value.eq("true"))
                    .select(schema::settings::episode_id)
                    .load::<Option<i64>>(self.conn)
                    .chain_err(|| "Error selecting favorite episodes")
            },
        )?;

        // Episode-scoped settings always carry an episode, but the column is
        // shared with the other scopes and so is nullable
        Ok(ids.into_iter().filter_map(|id| id).collect())
    }
}

pub struct RunResult {
    pub actions: Vec<EpisodeActionView>,
}

//
// Tests
//
