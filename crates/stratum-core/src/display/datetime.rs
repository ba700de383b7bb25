//! DateTime display utilities.
//!
//! Wrapper types for formatting timestamps and elapsed time in a consistent,
//! human-readable form.

use std::fmt;

use jiff::{tz::TimeZone, Timestamp};

/// A wrapper around `Timestamp` that formats it in the system timezone as
/// `YYYY-MM-DD HH:MM:SS TZ`.
pub struct LocalDateTime<'a>(pub &'a Timestamp);

impl fmt::Display for LocalDateTime<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            self.0
                .to_zoned(TimeZone::system())
                .strftime("%Y-%m-%d %H:%M:%S %Z")
        )
    }
}

/// Time between two timestamps, e.g. `4s`, `2m 05s`, `1h 00m 12s`.
///
/// ```rust
/// use jiff::Timestamp;
/// use stratum_core::display::Elapsed;
///
/// let start = Timestamp::from_second(0).unwrap();
/// let end = Timestamp::from_second(125).unwrap();
/// assert_eq!(Elapsed(&start, &end).to_string(), "2m 05s");
/// ```
pub struct Elapsed<'a>(pub &'a Timestamp, pub &'a Timestamp);

impl fmt::Display for Elapsed<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = (self.1.as_second() - self.0.as_second()).max(0);
        let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);

        if hours > 0 {
            write!(f, "{hours}h {minutes:02}m {seconds:02}s")
        } else if minutes > 0 {
            write!(f, "{minutes}m {seconds:02}s")
        } else {
            write!(f, "{seconds}s")
        }
    }
}
