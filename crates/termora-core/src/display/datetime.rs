//! Time formatting in the system timezone.

use std::fmt;

use jiff::{Timestamp, tz::TimeZone};

/// `YYYY-MM-DD HH:MM:SS TZ` in the system timezone.
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

/// Step duration: `850ms`, `2.4s` or `3m 05s`.
pub struct Elapsed(pub u64);

impl fmt::Display for Elapsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ms = self.0;
        match ms {
            0..1_000 => write!(f, "{ms}ms"),
            1_000..60_000 => write!(f, "{:.1}s", ms as f64 / 1000.0),
            _ => write!(f, "{}m {:02}s", ms / 60_000, (ms % 60_000) / 1000),
        }
    }
}
