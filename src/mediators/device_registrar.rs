use errors::*;
use mediators::common;
use model;
use model::insertable;
use schema;
use time_helpers;

use diesel;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use slog::Logger;

/// Gets a device by name, creating it on first sight.
///
/// This is how subscription and episode action uploads register devices. Note
/// that settings never go through here: a settings key naming a device that
/// doesn't exist is an error instead.
pub struct Mediator<'a> {
    pub conn: &'a PgConnection,
    pub name: &'a str,
    pub user: &'a model::User,
}

impl<'a> Mediator<'a> {
    pub fn run(&mut self, log: &Logger) -> Result<RunResult> {
        time_helpers::log_timed(&log.new(o!("step" => file!())), |log| {
            self.conn.transaction::<_, Error, _>(|| self.run_inner(log))
        })
    }

    fn run_inner(&mut self, log: &Logger) -> Result<RunResult> {
        common::validate_name("device", self.name)?;
        let num_inserted = self.insert_device(log)?;
        let device = common::load_device(log, self.conn, self.user, self.name)?;

        if num_inserted > 0 {
            info!(log, "Registered new device"; "device" => self.name, "user_id" => self.user.id);
        }

        Ok(RunResult {
            created: num_inserted > 0,
            device,
        })
    }

    //
    // Steps
    //

    // `DO NOTHING` on conflict so that two requests seeing a new device at the
    // same time don't fail each other.
    fn insert_device(&mut self, log: &Logger) -> Result<usize> {
        time_helpers::log_timed(&log.new(o!("step" => "insert_device")), |_log| {
            diesel::insert_into(schema::devices::table)
                .values(&insertable::Device {
                    caption:     "".to_owned(),
                    device_type: model::DeviceType::Other.as_str().to_owned(),
                    name:        self.name.to_owned(),
                    user_id:     self.user.id,
                })
                .on_conflict((schema::devices::user_id, schema::devices::name))
                .do_nothing()
                .execute(self.conn)
                .chain_err(|| "Error inserting device")
        })
    }
}

pub struct RunResult {
    pub created: bool,
    pub device:  model::Device,
}

//
// Tests
//

#[cfg(test)]
mod tests {
    use mediators::device_registrar::*;
    use test_data;
    use test_helpers;

    use r2d2::PooledConnection;
    use r2d2_diesel::ConnectionManager;

    #[test]
    fn test_device_register() {
        let mut bootstrap = TestBootstrap::new();
        let (mut mediator, log) = bootstrap.mediator("phone");
        let res = mediator.run(&log).unwrap();

        assert!(res.created);
        assert_ne!(0, res.device.id);
        assert_eq!("phone", res.device.name);
        assert_eq!("other", res.device.device_type);
        assert_eq!("", res.device.caption);
    }

    #[test]
    fn test_device_register_again() {
        let mut bootstrap = TestBootstrap::new();

        let id = {
            let (mut mediator, log) = bootstrap.mediator("phone");
            mediator.run(&log).unwrap().device.id
        };

        let (mut mediator, log) = bootstrap.mediator("phone");
        let res = mediator.run(&log).unwrap();
        assert!(!res.created);
        assert_eq!(id, res.device.id);
    }

    #[test]
    fn test_device_register_same_name_other_user() {
        let mut bootstrap = TestBootstrap::new();

        let id = {
            let (mut mediator, log) = bootstrap.mediator("phone");
            mediator.run(&log).unwrap().device.id
        };

        let other_user = test_data::user::insert(&bootstrap.log, &*bootstrap.conn);
        let res = Mediator {
            conn: &*bootstrap.conn,
            name: "phone",
            user: &other_user,
        }.run(&bootstrap.log)
            .unwrap();
        assert!(res.created);
        assert_ne!(id, res.device.id);
    }

    #[test]
    fn test_device_register_invalid_name() {
        let mut bootstrap = TestBootstrap::new();
        let (mut mediator, log) = bootstrap.mediator("");
        let e = mediator.run(&log).err().unwrap();
        assert_eq!(
            "Validation failed: Please specify a device name.",
            format!("{}", e).as_str()
        );
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

        fn mediator<'a>(&'a mut self, name: &'a str) -> (Mediator<'a>, Logger) {
            (
                Mediator {
                    conn: &*self.conn,
                    name,
                    user: &self.user,
                },
                self.log.clone(),
            )
        }
    }
}
