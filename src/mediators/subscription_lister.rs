use errors::*;
use mediators::common;
use model;
use schema;
use time_helpers;

use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use slog::Logger;

/// Lists the URLs of an account's current subscriptions.
///
/// With `since` set, only podcasts subscribed after that point are returned.
/// Unsubscriptions aren't reported here; clients that care about those should
/// use `subscription_change_lister`.
pub struct Mediator<'a> {
    pub conn:     &'a PgConnection,
    pub since:    Option<DateTime<Utc>>,
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
        let urls = self.select_urls(log, &user)?;
        Ok(RunResult { urls })
    }

    //
    // Steps
    //

    fn select_urls(&mut self, log: &Logger, user: &model::User) -> Result<Vec<String>> {
        time_helpers::log_timed(&log.new(o!("step" => "select_urls")), |_log| {
            let mut query = schema::podcasts::table
                .filter(schema::podcasts::user_id.eq(user.id))
                .filter(schema::podcasts::subscribed.eq(true))
                .select(schema::podcasts::url)
                .into_boxed();

            if let Some(since) = self.since {
                query = query.filter(schema::podcasts::updated_at.gt(since));
            }

            query
                .order(schema::podcasts::id)
                .load::<String>(self.conn)
                .chain_err(|| "Error selecting subscriptions")
        })
    }
}

pub struct RunResult {
    pub urls: Vec<String>,
}

//
// Tests
//

#[cfg(test)]
mod tests {
    use mediators::subscription_changer;
    use mediators::subscription_lister::*;
    use test_data;
    use test_helpers;

    use chrono::TimeZone;
    use r2d2::PooledConnection;
    use r2d2_diesel::ConnectionManager;

    #[test]
    fn test_subscription_list() {
        let mut bootstrap = TestBootstrap::new();
        bootstrap.change(&["http://ex.com/a", "http://ex.com/b"], &[], t(1));
        bootstrap.change(&["http://ex.com/c"], &["http://ex.com/a"], t(3));

        let (mut mediator, log) = bootstrap.mediator(None);
        let res = mediator.run(&log).unwrap();
        assert_eq!(
            vec!["http://ex.com/b".to_owned(), "http://ex.com/c".to_owned()],
            res.urls
        );
    }

    #[test]
    fn test_subscription_list_since() {
        let mut bootstrap = TestBootstrap::new();
        bootstrap.change(&["http://ex.com/a", "http://ex.com/b"], &[], t(1));
        bootstrap.change(&["http://ex.com/c"], &[], t(3));

        let (mut mediator, log) = bootstrap.mediator(Some(t(2)));
        let res = mediator.run(&log).unwrap();
        assert_eq!(vec!["http://ex.com/c".to_owned()], res.urls);
    }

    #[test]
    fn test_subscription_list_empty() {
        let mut bootstrap = TestBootstrap::new();
        let (mut mediator, log) = bootstrap.mediator(None);
        let res = mediator.run(&log).unwrap();
        assert!(res.urls.is_empty());
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

        fn change(&mut self, add: &[&str], remove: &[&str], timestamp: DateTime<Utc>) {
            let add = add.iter().map(|u| (*u).to_owned()).collect::<Vec<_>>();
            let remove = remove.iter().map(|u| (*u).to_owned()).collect::<Vec<_>>();

            subscription_changer::Mediator {
                add: &add,
                conn: &*self.conn,
                device: "dev1",
                remove: &remove,
                timestamp,
                username: &self.user.username,
            }.run(&self.log)
                .unwrap();
        }

        fn mediator(&mut self, since: Option<DateTime<Utc>>) -> (Mediator, Logger) {
            (
                Mediator {
                    conn: &*self.conn,
                    since,
                    username: &self.user.username,
                },
                self.log.clone(),
            )
        }
    }

    fn t(n: i64) -> DateTime<Utc> {
        Utc.timestamp(1_500_000_000 + n * 60, 0)
    }
}
