extern crate clap;
extern crate diesel;
extern crate podsync;
extern crate r2d2;
extern crate r2d2_diesel;
extern crate serde;
extern crate serde_json;
#[macro_use]
extern crate slog;
extern crate slog_async;
extern crate slog_term;

use podsync::database;
use podsync::error_helpers;
use podsync::errors::*;
use podsync::mediators::common;
use podsync::mediators::device_lister;
use podsync::mediators::subscription_lister;
use podsync::mediators::user_creator;
use podsync::mediators::user_destroyer;
use podsync::time_helpers;

use clap::{App, ArgMatches, SubCommand};
use diesel::pg::PgConnection;
use r2d2::{Pool, PooledConnection};
use r2d2_diesel::ConnectionManager;
use serde::Serialize;
use slog::{Drain, Logger};
use std::env;
use std::str::FromStr;
use std::time::Duration;

// Defaults for settings that can come from either the environment or flags.
const DEFAULT_NUM_CONNECTIONS: u32 = 10;
const DEFAULT_SCRYPT_LOG_N: u8 = 14;
const DEFAULT_STATEMENT_TIMEOUT_MS: u64 = 30_000;

//
// Main
//

fn main() {
    let mut app = App::new("podsync")
        .version("0.1")
        .about("A general utility command for the podsync project")
        .arg_from_usage("-q --quiet 'Quiets all output'")
        .arg_from_usage("--database-url [DATABASE_URL] 'Database URL (defaults to $DATABASE_URL)'")
        .arg_from_usage(
            "--num-connections [NUM_CONNECTIONS] 'Size of the connection pool \
             (defaults to $NUM_CONNECTIONS or 10)'",
        )
        .arg_from_usage(
            "--statement-timeout-ms [STATEMENT_TIMEOUT_MS] 'Statement timeout in milliseconds \
             (defaults to $STATEMENT_TIMEOUT_MS or 30000)'",
        )
        .subcommand(SubCommand::with_name("migrate").about("Runs any pending database migrations"))
        .subcommand(
            SubCommand::with_name("user-create")
                .about("Creates a user")
                // <arg> is required and [arg] is optional
                .arg_from_usage("<USERNAME> 'Name of the user to create'")
                .arg_from_usage("<PASSWORD> 'Password for the new user'")
                .arg_from_usage(
                    "--scrypt-log-n [SCRYPT_LOG_N] 'Scrypt work factor \
                     (defaults to $SCRYPT_LOG_N or 14)'",
                ),
        )
        .subcommand(
            SubCommand::with_name("user-destroy")
                .about("Destroys a user and everything that belongs to them")
                .arg_from_usage("<USERNAME> 'Name of the user to destroy'"),
        )
        .subcommand(
            SubCommand::with_name("subscriptions")
                .about("Prints a user's subscribed podcast URLs")
                .arg_from_usage("<USERNAME> 'Name of the user'")
                .arg_from_usage("--since [SINCE] 'Only subscriptions made after this Unix time'"),
        )
        .subcommand(
            SubCommand::with_name("devices")
                .about("Prints a user's devices")
                .arg_from_usage("<USERNAME> 'Name of the user'"),
        );

    let matches = app.clone().get_matches();
    let log = log(matches.is_present("quiet"));

    let res = match matches.subcommand_name() {
        Some("devices") => list_devices(&log, &matches),
        Some("migrate") => migrate(&log, &matches),
        Some("subscriptions") => list_subscriptions(&log, &matches),
        Some("user-create") => create_user(&log, &matches),
        Some("user-destroy") => destroy_user(&log, &matches),
        None => {
            app.print_help().unwrap();
            return;
        }
        _ => unreachable!(),
    };

    if let Err(ref e) = res {
        handle_error(&log, e);
    };
}

//
// Subcommands
//

fn create_user(log: &Logger, matches: &ArgMatches) -> Result<()> {
    let sub_matches = matches.subcommand_matches("user-create").unwrap();
    let scrypt_log_n = config_value(
        sub_matches.value_of("scrypt-log-n"),
        "SCRYPT_LOG_N",
        DEFAULT_SCRYPT_LOG_N,
    )?;

    let conn = connection(log, matches)?;
    let res = user_creator::Mediator {
        conn: &*conn,
        password: sub_matches.value_of("PASSWORD").unwrap(),
        scrypt_log_n,
        username: sub_matches.value_of("USERNAME").unwrap(),
    }.run(log)?;

    print_json(&res.user)
}

fn destroy_user(log: &Logger, matches: &ArgMatches) -> Result<()> {
    let sub_matches = matches.subcommand_matches("user-destroy").unwrap();

    let conn = connection(log, matches)?;
    let user = common::load_user(log, &*conn, sub_matches.value_of("USERNAME").unwrap())?;
    let res = user_destroyer::Mediator {
        conn: &*conn,
        user: &user,
    }.run(log)?;

    info!(log, "Destroyed user";
        "num_devices_deleted" => res.num_devices_deleted,
        "num_episode_actions_deleted" => res.num_episode_actions_deleted,
        "num_podcasts_deleted" => res.num_podcasts_deleted,
        "num_settings_deleted" => res.num_settings_deleted);
    Ok(())
}

fn list_devices(log: &Logger, matches: &ArgMatches) -> Result<()> {
    let sub_matches = matches.subcommand_matches("devices").unwrap();

    let conn = connection(log, matches)?;
    let res = device_lister::Mediator {
        conn:     &*conn,
        username: sub_matches.value_of("USERNAME").unwrap(),
    }.run(log)?;

    print_json(&res.devices)
}

fn list_subscriptions(log: &Logger, matches: &ArgMatches) -> Result<()> {
    let sub_matches = matches.subcommand_matches("subscriptions").unwrap();
    let since = match sub_matches.value_of("since") {
        Some(s) => time_helpers::since_from_unix(
            s.parse::<i64>()
                .chain_err(|| format!("Invalid --since value: {}", s))?,
        )?,
        None => None,
    };

    let conn = connection(log, matches)?;
    let res = subscription_lister::Mediator {
        conn: &*conn,
        since,
        username: sub_matches.value_of("USERNAME").unwrap(),
    }.run(log)?;

    print_json(&res.urls)
}

fn migrate(log: &Logger, matches: &ArgMatches) -> Result<()> {
    let conn = connection(log, matches)?;
    database::run_migrations(log, &*conn)
}

//
// Private types/functions
//

/// Reads a setting from a flag, falling back to an environment variable and
/// then to a default.
fn config_value<T>(flag: Option<&str>, env_var: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + 'static,
{
    let raw = match flag {
        Some(raw) => raw.to_owned(),
        None => match env::var(env_var) {
            Ok(raw) => raw,
            Err(_) => return Ok(default),
        },
    };

    raw.parse::<T>()
        .chain_err(|| format!("Invalid value for {}: {}", env_var, raw))
}

fn connection(
    log: &Logger,
    matches: &ArgMatches,
) -> Result<PooledConnection<ConnectionManager<PgConnection>>> {
    pool(log, matches)?.get().map_err(Error::from)
}

fn handle_error(log: &Logger, e: &Error) {
    error_helpers::print_error(log, e);
    ::std::process::exit(1);
}

fn log(quiet: bool) -> Logger {
    if !quiet {
        // Logs go to stderr so that they never mix with JSON printed to stdout
        let decorator = slog_term::PlainSyncDecorator::new(std::io::stderr());
        let drain = slog_term::CompactFormat::new(decorator).build().fuse();
        let async_drain = slog_async::Async::new(drain).build().fuse();
        slog::Logger::root(async_drain, o!())
    } else {
        slog::Logger::root(slog::Discard, o!())
    }
}

fn pool(log: &Logger, matches: &ArgMatches) -> Result<Pool<ConnectionManager<PgConnection>>> {
    let database_url = match matches.value_of("database-url") {
        Some(url) => url.to_owned(),
        None => env::var("DATABASE_URL").chain_err(|| "DATABASE_URL must be set")?,
    };

    let num_connections = config_value(
        matches.value_of("num-connections"),
        "NUM_CONNECTIONS",
        DEFAULT_NUM_CONNECTIONS,
    )?;

    let statement_timeout_ms = config_value(
        matches.value_of("statement-timeout-ms"),
        "STATEMENT_TIMEOUT_MS",
        DEFAULT_STATEMENT_TIMEOUT_MS,
    )?;

    database::pool(
        log,
        &database::Config {
            database_url,
            num_connections,
            statement_timeout: Duration::from_millis(statement_timeout_ms),
        },
    )
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).chain_err(|| "Error serializing output")?;
    println!("{}", json);
    Ok(())
}
