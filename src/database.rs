//! Connection pooling and schema migrations.

use errors::*;
use time_helpers;

use diesel::connection::SimpleConnection;
use diesel::pg::PgConnection;
use r2d2::{CustomizeConnection, Pool};
use r2d2_diesel;
use r2d2_diesel::ConnectionManager;
use slog::Logger;
use std::time::Duration;

embed_migrations!("migrations");

pub struct Config {
    pub database_url:      String,
    pub num_connections:   u32,
    pub statement_timeout: Duration,
}

/// Builds a connection pool. Every connection that it hands out has a
/// statement timeout applied, so a runaway query errors (and rolls back its
/// transaction) instead of holding a connection forever.
pub fn pool(log: &Logger, config: &Config) -> Result<Pool<ConnectionManager<PgConnection>>> {
    time_helpers::log_timed(&log.new(o!("step" => "build_pool")), |log| {
        info!(log, "Building connection pool";
            "num_connections" => config.num_connections,
            "statement_timeout_ms" => duration_millis(config.statement_timeout));

        let manager = ConnectionManager::<PgConnection>::new(config.database_url.as_str());
        Pool::builder()
            .connection_customizer(Box::new(StatementTimeout {
                timeout: config.statement_timeout,
            }))
            .max_size(config.num_connections)
            .build(manager)
            .map_err(Error::from)
    })
}

/// Applies any migrations that haven't been run yet.
pub fn run_migrations(log: &Logger, conn: &PgConnection) -> Result<()> {
    time_helpers::log_timed(&log.new(o!("step" => "run_migrations")), |_log| {
        embedded_migrations::run(conn).chain_err(|| "Error running migrations")
    })
}

/// An r2d2 customizer that sets Postgres' `statement_timeout` on every
/// connection as it's checked out of the pool.
#[derive(Debug)]
pub struct StatementTimeout {
    pub timeout: Duration,
}

impl CustomizeConnection<PgConnection, r2d2_diesel::Error> for StatementTimeout {
    fn on_acquire(&self, conn: &mut PgConnection) -> ::std::result::Result<(), r2d2_diesel::Error> {
        conn.batch_execute(&format!(
            "SET statement_timeout = {}",
            duration_millis(self.timeout)
        )).map_err(r2d2_diesel::Error::QueryError)
    }
}

//
// Private functions
//

fn duration_millis(d: Duration) -> u64 {
    d.as_secs() * 1_000 + u64::from(d.subsec_nanos() / 1_000_000)
}

#[cfg(test)]
mod tests {
    use database::*;

    #[test]
    fn test_duration_millis() {
        assert_eq!(30_000, duration_millis(Duration::from_secs(30)));
        assert_eq!(1_500, duration_millis(Duration::from_millis(1_500)));
    }
}
