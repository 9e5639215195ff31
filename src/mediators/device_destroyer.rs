use errors::*;
use mediators::common;
use model;
use schema;
use time_helpers;

use diesel;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use slog::Logger;

/// Deletes a device.
///
/// The device's episode actions are kept and detached (their device becomes
/// null) because they're still part of the account's history. Settings scoped
/// to the device go with it.
pub struct Mediator<'a> {
    pub conn:     &'a PgConnection,
    pub name:     &'a str,
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
        let device = common::load_device(log, self.conn, &user, self.name)?;

        let num_episode_actions_detached = self.detach_episode_actions(log, &device)?;
        let num_settings_deleted = self.delete_settings(log, &device)?;
        let num_device_deleted = self.delete_device(log, &device)?;

        Ok(RunResult {
            num_device_deleted,
            num_episode_actions_detached,
            num_settings_deleted,
        })
    }

    //
    // Steps
    //

    fn delete_device(&mut self, log: &Logger, device: &model::Device) -> Result<usize> {
        time_helpers::log_timed(&log.new(o!("step" => "delete_device")), |_log| {
            diesel::delete(schema::devices::table.filter(schema::devices::id.eq(device.id)))
                .execute(self.conn)
                .chain_err(|| "Error deleting device")
        })
    }

    fn delete_settings(&mut self, log: &Logger, device: &model::Device) -> Result<usize> {
        time_helpers::log_timed(&log.new(o!("step" => "delete_settings")), |_log| {
            diesel::delete(
                schema::settings::table.filter(schema::settings::device_id.eq(device.id)),
            ).execute(self.conn)
                .chain_err(|| "Error deleting device settings")
        })
    }

    fn detach_episode_actions(&mut self, log: &Logger, device: &model::Device) -> Result<usize> {
        time_helpers::log_timed(&log.new(o!("step" => "detach_episode_actions")), |_log| {
            diesel::update(schema::episode_actions::table)
                .filter(schema::episode_actions::device_id.eq(device.id))
                .set(schema::episode_actions::device_id.eq(None::<i64>))
                .execute(self.conn)
                .chain_err(|| "Error detaching episode actions from device")
        })
    }
}

pub struct RunResult {
    pub num_device_deleted:           usize,
    pub num_episode_actions_detached: usize,
    pub num_settings_deleted:         usize,
}

//
// Tests
//
