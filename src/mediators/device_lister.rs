use errors::*;
use mediators::common;
use model;
use schema;
use time_helpers;

use diesel::pg::PgConnection;
use diesel::prelude::*;
use slog::Logger;

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
        let devices = self.select_devices(log, &user)?;
        let num_subscriptions = self.count_subscriptions(log, &user)?;

        // Subscriptions belong to the account rather than any one device, so
        // every device reports the same count.
        Ok(RunResult {
            devices: devices
                .into_iter()
                .map(|device| DeviceSummary {
                    device,
                    subscriptions: num_subscriptions,
                })
                .collect(),
        })
    }

    //
    // Steps
    //

    fn count_subscriptions(&mut self, log: &Logger, user: &model::User) -> Result<i64> {
        time_helpers::log_timed(&log.new(o!("step" => "count_subscriptions")), |_log| {
            schema::podcasts::table
                .filter(schema::podcasts::user_id.eq(user.id))
                .filter(schema::podcasts::subscribed.eq(true))
                .count()
                .get_result(self.conn)
                .chain_err(|| "Error counting subscriptions")
        })
    }

    fn select_devices(&mut self, log: &Logger, user: &model::User) -> Result<Vec<model::Device>> {
        time_helpers::log_timed(&log.new(o!("step" => "select_devices")), |_log| {
            schema::devices::table
                .filter(schema::devices::user_id.eq(user.id))
                .order(schema::devices::name.asc())
                .load::<model::Device>(self.conn)
                .chain_err(|| "Error selecting devices")
        })
    }
}

#[derive(Serialize)]
pub struct DeviceSummary {
    #[serde(flatten)]
    pub device: model::Device,

    pub subscriptions: i64,
}

pub struct RunResult {
    pub devices: Vec<DeviceSummary>,
}

//
// Tests
//
