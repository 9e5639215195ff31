use errors::*;
use mediators::common;
use model;
use model::insertable;
use schema;
use time_helpers;

use crypto::scrypt;
use diesel;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use slog::Logger;

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Bounds for scrypt's work factor. Anything past the maximum would need
/// terabytes of memory to hash a single password.
pub const MAX_SCRYPT_LOG_N: u8 = 32;
pub const MIN_SCRYPT_LOG_N: u8 = 1;

pub struct Mediator<'a> {
    pub conn:         &'a PgConnection,
    pub password:     &'a str,
    pub scrypt_log_n: u8,
    pub username:     &'a str,
}

impl<'a> Mediator<'a> {
    pub fn run(&mut self, log: &Logger) -> Result<RunResult> {
        time_helpers::log_timed(&log.new(o!("step" => file!())), |log| {
            self.conn.transaction::<_, Error, _>(|| self.run_inner(log))
        })
    }

    fn run_inner(&mut self, log: &Logger) -> Result<RunResult> {
        self.params_validate()?;
        self.check_existing_user(log)?;
        let password_scrypt = self.scrypt_password(log)?;
        let user = self.insert_user(log, password_scrypt)?;
        Ok(RunResult { user })
    }

    //
    // Steps
    //

    fn insert_user(&mut self, log: &Logger, password_scrypt: String) -> Result<model::User> {
        time_helpers::log_timed(&log.new(o!("step" => "insert_user")), |_log| {
            diesel::insert_into(schema::users::table)
                .values(&insertable::User {
                    password_scrypt,
                    username: self.username.to_owned(),
                })
                .get_result(self.conn)
                .chain_err(|| "Error inserting user")
        })
    }

    //
    // Private functions
    //

    /// Checks whether a user with the given name already exists.
    ///
    /// The `UNIQUE` constraint would catch this anyway, but not with an error
    /// that we'd want to show anyone.
    fn check_existing_user(&self, log: &Logger) -> Result<()> {
        let user_exists =
            time_helpers::log_timed(&log.new(o!("step" => "select_existing_user")), |_log| {
                diesel::select(diesel::dsl::exists(
                    schema::users::table.filter(schema::users::username.eq(self.username)),
                )).get_result(self.conn)
                    .chain_err(|| "Error checking user existence")
            })?;

        if user_exists {
            bail!(user_errors::validation("A user with that name already exists."));
        }

        Ok(())
    }

    /// Performs validations on parameters. These are user facing.
    fn params_validate(&self) -> Result<()> {
        common::validate_name("user", self.username)?;

        if self.password.len() < MIN_PASSWORD_LENGTH {
            bail!(user_errors::validation(format!(
                "Password must be at least {} characters long.",
                MIN_PASSWORD_LENGTH
            )));
        }

        // `ScryptParams` panics on a work factor that's out of range, so
        // catch a bad configuration value before hashing
        if self.scrypt_log_n < MIN_SCRYPT_LOG_N || self.scrypt_log_n > MAX_SCRYPT_LOG_N {
            bail!(user_errors::validation(format!(
                "Scrypt work factor must be between {} and {}.",
                MIN_SCRYPT_LOG_N, MAX_SCRYPT_LOG_N
            )));
        }

        Ok(())
    }

    /// Scrypting is expensive (full seconds with a production `log_n`), so
    /// it's timed on its own.
    fn scrypt_password(&self, log: &Logger) -> Result<String> {
        time_helpers::log_timed(&log.new(o!("step" => "scrypt_password")), |log| {
            debug!(log, "Scrypting password"; "log_n" => self.scrypt_log_n);
            scrypt::scrypt_simple(self.password, &scrypt::ScryptParams::new(self.scrypt_log_n, 8, 1))
                .chain_err(|| "Error scrypting password")
        })
    }
}

pub struct RunResult {
    pub user: model::User,
}

//
// Tests
//
