use errors::*;
use mediators::common;
use mediators::device_registrar;
use model;
use schema;
use time_helpers;

use chrono::Utc;
use diesel;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use slog::Logger;

/// Updates a device's caption and/or type, creating the device if it doesn't
/// exist yet (clients commonly configure a device before ever syncing from
/// it).
pub struct Mediator<'a> {
    pub caption:     Option<&'a str>,
    pub conn:        &'a PgConnection,
    pub device_type: Option<&'a str>,
    pub name:        &'a str,
    pub username:    &'a str,
}

impl<'a> Mediator<'a> {
    pub fn run(&mut self, log: &Logger) -> Result<RunResult> {
        time_helpers::log_timed(&log.new(o!("step" => file!())), |log| {
            self.conn.transaction::<_, Error, _>(|| self.run_inner(log))
        })
    }

    fn run_inner(&mut self, log: &Logger) -> Result<RunResult> {
        let device_type = self.params_validate()?;
        let user = common::load_user(log, self.conn, self.username)?;
        let device = device_registrar::Mediator {
            conn: self.conn,
            name: self.name,
            user: &user,
        }.run(log)?
            .device;
        let device = self.update_device(log, &device, device_type)?;
        Ok(RunResult { device })
    }

    //
    // Steps
    //

    fn update_device(
        &mut self,
        log: &Logger,
        device: &model::Device,
        device_type: Option<model::DeviceType>,
    ) -> Result<model::Device> {
        let caption = self.caption.unwrap_or(device.caption.as_str());
        let device_type = device_type
            .map(|t| t.as_str())
            .unwrap_or(device.device_type.as_str());

        time_helpers::log_timed(&log.new(o!("step" => "update_device")), |_log| {
            diesel::update(schema::devices::table)
                .filter(schema::devices::id.eq(device.id))
                .set((
                    schema::devices::caption.eq(caption),
                    schema::devices::device_type.eq(device_type),
                    schema::devices::updated_at.eq(Utc::now()),
                ))
                .get_result(self.conn)
                .chain_err(|| "Error updating device")
        })
    }

    //
    // Private functions
    //

    /// Performs validations on parameters. These are user facing.
    fn params_validate(&self) -> Result<Option<model::DeviceType>> {
        common::validate_name("device", self.name)?;

        match self.device_type {
            Some(device_type) => Ok(Some(device_type.parse::<model::DeviceType>()?)),
            None => Ok(None),
        }
    }
}

pub struct RunResult {
    pub device: model::Device,
}

//
// Tests
//

#[cfg(test)]
mod tests {
    use mediators::device_updater::*;
    use test_data;
    use test_helpers;

    use r2d2::PooledConnection;
    use r2d2_diesel::ConnectionManager;

    #[test]
    fn test_device_update_creates() {
        let mut bootstrap = TestBootstrap::new();
        let (mut mediator, log) = bootstrap.mediator(Args {
            caption:     Some("My Phone"),
            device_type: Some("mobile"),
        });
        let res = mediator.run(&log).unwrap();

        assert_ne!(0, res.device.id);
        assert_eq!("My Phone", res.device.caption);
        assert_eq!("mobile", res.device.device_type);
    }

    #[test]
    fn test_device_update_partial() {
        let mut bootstrap = TestBootstrap::new();

        {
            let (mut mediator, log) = bootstrap.mediator(Args {
                caption:     Some("My Phone"),
                device_type: Some("mobile"),
            });
            mediator.run(&log).unwrap();
        }

        let (mut mediator, log) = bootstrap.mediator(Args {
            caption:     None,
            device_type: Some("laptop"),
        });
        let res = mediator.run(&log).unwrap();

        // Caption is left alone when not specified
        assert_eq!("My Phone", res.device.caption);
        assert_eq!("laptop", res.device.device_type);
    }

    #[test]
    fn test_device_update_invalid_type() {
        let mut bootstrap = TestBootstrap::new();
        let (mut mediator, log) = bootstrap.mediator(Args {
            caption:     None,
            device_type: Some("toaster"),
        });
        let e = mediator.run(&log).err().unwrap();
        assert_eq!(
            "Validation failed: Unknown device type \"toaster\".",
            format!("{}", e).as_str()
        );

        // Validation runs before the device is registered
        let user = common::load_user(&bootstrap.log, &*bootstrap.conn, &bootstrap.user.username)
            .unwrap();
        assert!(
            common::find_device(&bootstrap.log, &*bootstrap.conn, &user, "phone")
                .unwrap()
                .is_none()
        );
    }

    //
    // Private types/functions
    //

    struct Args {
        caption:     Option<&'static str>,
        device_type: Option<&'static str>,
    }

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

        fn mediator(&mut self, args: Args) -> (Mediator, Logger) {
            (
                Mediator {
                    caption:     args.caption,
                    conn:        &*self.conn,
                    device_type: args.device_type,
                    name:        "phone",
                    username:    &self.user.username,
                },
                self.log.clone(),
            )
        }
    }
}
