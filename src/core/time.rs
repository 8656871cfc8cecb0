use std::ops::{Add, AddAssign, Sub, SubAssign};
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeDelta, Utc};

/// Wall-clock instant carried by timestamp fragments and message headers.
///
/// Defaults to the UNIX epoch, which doubles as the "no timestamp received
/// yet" sentinel: the bridge republishes it as-is until the first timestamp
/// fragment arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UtcInstant {
    utc: DateTime<Utc>,
}

impl UtcInstant {
    pub fn now() -> UtcInstant {
        UtcInstant { utc: Utc::now() }
    }

    pub const fn epoch() -> UtcInstant {
        UtcInstant {
            utc: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    pub fn is_epoch(&self) -> bool {
        self.utc == DateTime::<Utc>::UNIX_EPOCH
    }

    /// Instant at `secs` seconds + `nanos` nanoseconds past the epoch.
    pub fn from_timestamp(secs: i64, nanos: u32) -> Option<UtcInstant> {
        Some(UtcInstant {
            utc: DateTime::<Utc>::from_timestamp(secs, nanos)?,
        })
    }

    pub fn duration_since(&self, other: UtcInstant) -> TimeDelta {
        self.utc - other.utc
    }

    /// Time since the UNIX epoch.
    pub fn elapsed(&self) -> TimeDelta {
        self.utc - DateTime::<Utc>::UNIX_EPOCH
    }
}

impl Default for UtcInstant {
    fn default() -> Self {
        UtcInstant::epoch()
    }
}

impl From<DateTime<Utc>> for UtcInstant {
    fn from(utc: DateTime<Utc>) -> Self {
        UtcInstant { utc }
    }
}

impl Add<TimeDelta> for UtcInstant {
    type Output = UtcInstant;

    fn add(self, rhs: TimeDelta) -> Self::Output {
        UtcInstant {
            utc: self.utc + rhs,
        }
    }
}

impl AddAssign<TimeDelta> for UtcInstant {
    fn add_assign(&mut self, rhs: TimeDelta) {
        self.utc += rhs;
    }
}

impl Sub<TimeDelta> for UtcInstant {
    type Output = UtcInstant;

    fn sub(self, rhs: TimeDelta) -> Self::Output {
        UtcInstant {
            utc: self.utc - rhs,
        }
    }
}

impl SubAssign<TimeDelta> for UtcInstant {
    fn sub_assign(&mut self, rhs: TimeDelta) {
        self.utc -= rhs
    }
}

/// Fixed-period tick keeper for free-running loops.
///
/// `sleep` blocks until the next tick boundary. If the caller overran the
/// boundary the schedule re-anchors to now instead of firing a burst of
/// catch-up ticks.
#[derive(Debug)]
pub struct Rate {
    period: Duration,
    next: Instant,
}

impl Rate {
    pub fn new(period: Duration) -> Rate {
        Rate {
            period,
            next: Instant::now() + period,
        }
    }

    pub fn from_hz(hz: f64) -> Rate {
        assert!(hz > 0.0, "rate must be positive, got {hz}");
        Rate::new(Duration::from_secs_f64(1.0 / hz))
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn sleep(&mut self) {
        let now = Instant::now();
        if now < self.next {
            std::thread::sleep(self.next - now);
            self.next += self.period;
        } else {
            self.next = now + self.period;
        }
    }
}
