use errors::*;
use model;
use schema;
use time_helpers;

use diesel;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use slog::Logger;

/// Destroys a user along with everything that belongs to them.
///
/// Foreign keys cascade, so deleting the user row alone would be enough, but
/// everything is deleted explicitly from the bottom up so that what was
/// removed can be reported.
pub struct Mediator<'a> {
    pub conn: &'a PgConnection,
    pub user: &'a model::User,
}

impl<'a> Mediator<'a> {
    pub fn run(&mut self, log: &Logger) -> Result<RunResult> {
        time_helpers::log_timed(&log.new(o!("step" => file!())), |log| {
            self.conn.transaction::<_, Error, _>(|| self.run_inner(log))
        })
    }

    fn run_inner(&mut self, log: &Logger) -> Result<RunResult> {
        let num_settings_deleted = self.delete_settings(log)?;
        let num_episode_actions_deleted = self.delete_episode_actions(log)?;
        let num_episodes_deleted = self.delete_episodes(log)?;
        let num_podcasts_deleted = self.delete_podcasts(log)?;
        let num_devices_deleted = self.delete_devices(log)?;
        let num_users_deleted = self.delete_user(log)?;

        Ok(RunResult {
            num_devices_deleted,
            num_episode_actions_deleted,
            num_episodes_deleted,
            num_podcasts_deleted,
            num_settings_deleted,
            num_users_deleted,
        })
    }

    //
    // Steps
    //

    fn delete_devices(&mut self, log: &Logger) -> Result<usize> {
        time_helpers::log_timed(&log.new(o!("step" => "delete_devices")), |_log| {
            diesel::delete(
                schema::devices::table.filter(schema::devices::user_id.eq(self.user.id)),
            ).execute(self.conn)
                .chain_err(|| "Error deleting devices")
        })
    }

    fn delete_episode_actions(&mut self, log: &Logger) -> Result<usize> {
        time_helpers::log_timed(&log.new(o!("step" => "delete_episode_actions")), |_log| {
            diesel::delete(
                schema::episode_actions::table.filter(
                    schema::episode_actions::podcast_id.eq_any(
                        schema::podcasts::table
                            .filter(schema::podcasts::user_id.eq(self.user.id))
                            .select(schema::podcasts::id),
                    ),
                ),
            ).execute(self.conn)
                .chain_err(|| "Error deleting episode actions")
        })
    }

    fn delete_episodes(&mut self, log: &Logger) -> Result<usize> {
        time_helpers::log_timed(&log.new(o!("step" => "delete_episodes")), |_log| {
            diesel::delete(
                schema::episodes::table.filter(
                    schema::episodes::podcast_id.eq_any(
                        schema::podcasts::table
                            .filter(schema::podcasts::user_id.eq(self.user.id))
                            .select(schema::podcasts::id),
                    ),
                ),
            ).execute(self.conn)
                .chain_err(|| "Error deleting episodes")
        })
    }

    fn delete_podcasts(&mut self, log: &Logger) -> Result<usize> {
        time_helpers::log_timed(&log.new(o!("step" => "delete_podcasts")), |_log| {
            diesel::delete(
                schema::podcasts::table.filter(schema::podcasts::user_id.eq(self.user.id)),
            ).execute(self.conn)
                .chain_err(|| "Error deleting podcasts")
        })
    }

    fn delete_settings(&mut self, log: &Logger) -> Result<usize> {
        time_helpers::log_timed(&log.new(o!("step" => "delete_settings")), |_log| {
            diesel::delete(
                schema::settings::table.filter(schema::settings::user_id.eq(self.user.id)),
            ).execute(self.conn)
                .chain_err(|| "Error deleting settings")
        })
    }

    fn delete_user(&mut self, log: &Logger) -> Result<usize> {
        time_helpers::log_timed(&log.new(o!("step" => "delete_user")), |_log| {
            diesel::delete(schema::users::table.filter(schema::users::id.eq(self.user.id)))
                .execute(self.conn)
                .chain_err(|| "Error deleting user")
        })
    }
}

pub struct RunResult {
    pub num_devices_deleted:         usize,
    pub num_episode_actions_deleted: usize,
    pub num_episodes_deleted:        usize,
    pub num_podcasts_deleted:        usize,
    pub num_settings_deleted:        usize,
    pub num_users_deleted:           usize,
}

//
// Tests
//
