use errors::*;

use chrono::{DateTime, TimeZone, Utc};
use slog::Logger;
use time;

#[inline]
pub fn log_timed<T, F>(log: &Logger, f: F) -> T
where
    F: FnOnce(&Logger) -> T,
{
    let start = time::precise_time_ns();
    info!(log, "Start");
    let res = f(log);
    let elapsed = time::precise_time_ns() - start;
    info!(log, "Finish"; "elapsed" => unit_str(elapsed));
    res
}

#[inline]
pub fn unit_str(ns: u64) -> String {
    let (div, unit) = unit(ns);
    format!("{:.*}{}", 3, ((ns as f64) / div), unit).to_owned()
}

/// The `updated_at` given to podcast rows that have never been subscribed.
///
/// It sorts before any real `since` so that such rows never show up in a
/// subscription diff.
#[inline]
pub fn epoch() -> DateTime<Utc> {
    Utc.timestamp(0, 0)
}

/// Converts a client's `since` in Unix seconds to a bound for sync queries.
///
/// Zero (or anything before it) is the "I've never synced" value and maps to
/// `None`, which asks for full current state rather than a diff. Values too
/// large to be represented as a time are a validation error.
pub fn since_from_unix(seconds: i64) -> Result<Option<DateTime<Utc>>> {
    if seconds <= 0 {
        return Ok(None);
    }

    match Utc.timestamp_opt(seconds, 0).single() {
        Some(since) => Ok(Some(since)),
        None => Err(user_errors::validation(format!(
            "Since value {} is out of range.",
            seconds
        ))),
    }
}

//
// Private functions
//

#[inline]
fn unit(ns: u64) -> (f64, &'static str) {
    if ns >= 1_000_000_000 {
        (1_000_000_000_f64, "s")
    } else if ns >= 1_000_000 {
        (1_000_000_f64, "ms")
    } else if ns >= 1_000 {
        (1_000_f64, "µs")
    } else {
        (1_f64, "ns")
    }
}

#[cfg(test)]
mod tests {
    use errors::*;
    use time_helpers::*;

    #[test]
    fn test_unit() {
        assert_eq!((1_f64, "ns"), unit(2_u64));
        assert_eq!((1_000_f64, "µs"), unit(2_000_u64));
        assert_eq!((1_000_000_f64, "ms"), unit(2_000_000_u64));
        assert_eq!((1_000_000_000_f64, "s"), unit(2_000_000_000_u64));
    }

    #[test]
    fn test_unit_str() {
        assert_eq!("2.500ms", unit_str(2_500_000_u64).as_str());
    }

    #[test]
    fn test_since_from_unix() {
        assert_eq!(None, since_from_unix(0).unwrap());
        assert_eq!(None, since_from_unix(-5).unwrap());
        assert_eq!(
            Some(Utc.timestamp(1_500_000_000, 0)),
            since_from_unix(1_500_000_000).unwrap()
        );
    }

    #[test]
    fn test_since_from_unix_out_of_range() {
        for &seconds in &[1_000_000_000_000_000_i64, i64::max_value()] {
            let e = since_from_unix(seconds).err().unwrap();
            assert_eq!(
                format!("Validation failed: Since value {} is out of range.", seconds),
                public_message(&e)
            );
        }
    }
}
