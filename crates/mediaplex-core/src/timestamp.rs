// crates/mediaplex-core/src/timestamp.rs
//
// Signed, nanosecond-resolution playback time. Plain newtype over i64 rather
// than std::time::Duration because playback positions can go negative
// (pre-roll, a seek target before the first keyframe) and Duration can't.

use std::fmt;
use std::ops::{Add, AddAssign, Sub};

/// Nanosecond-resolution signed timestamp.
///
/// `UNSET` is a distinguished sentinel meaning "force the next render" — it
/// is never a real playback position. It participates in the derived
/// `PartialEq` like any other value (`UNSET == UNSET`), which is exactly
/// what `is_unset()` and RenderingWorker's "already sent this block?" check
/// rely on: comparing a stored last-render-time against `UNSET` tells you
/// whether anything has been rendered yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Sentinel meaning "no previous render" / "force next block through".
    pub const UNSET: Timestamp = Timestamp(i64::MIN);

    pub const ZERO: Timestamp = Timestamp(0);

    pub fn from_nanos(nanos: i64) -> Self {
        Timestamp(nanos)
    }

    pub fn from_secs_f64(secs: f64) -> Self {
        Timestamp((secs * 1_000_000_000.0).round() as i64)
    }

    pub fn as_nanos(&self) -> i64 {
        self.0
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / 1_000_000_000.0
    }

    pub fn is_unset(&self) -> bool {
        *self == Timestamp::UNSET
    }

    /// One tick past this timestamp, used when a frame lacks a valid start
    /// time and materialize() falls back to `prev.end + 1 tick`.
    pub fn next_tick(&self) -> Timestamp {
        Timestamp(self.0.saturating_add(1))
    }

    pub fn saturating_sub(&self, other: Timestamp) -> Timestamp {
        Timestamp(self.0.saturating_sub(other.0))
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Timestamp::ZERO
    }
}

impl Add for Timestamp {
    type Output = Timestamp;
    fn add(self, rhs: Timestamp) -> Timestamp {
        Timestamp(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Timestamp {
    fn add_assign(&mut self, rhs: Timestamp) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl Sub for Timestamp {
    type Output = Timestamp;
    fn sub(self, rhs: Timestamp) -> Timestamp {
        Timestamp(self.0.saturating_sub(rhs.0))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unset() {
            write!(f, "UNSET")
        } else {
            write!(f, "{:.3}s", self.as_secs_f64())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_round_trips_through_is_unset() {
        assert!(Timestamp::UNSET.is_unset());
        assert!(!Timestamp::ZERO.is_unset());
    }

    #[test]
    fn addition_and_subtraction_are_exact_for_whole_seconds() {
        let a = Timestamp::from_secs_f64(1.0);
        let b = Timestamp::from_secs_f64(0.5);
        assert_eq!((a + b).as_secs_f64(), 1.5);
        assert_eq!((a - b).as_secs_f64(), 0.5);
    }

    #[test]
    fn negative_timestamps_compare_correctly() {
        let neg = Timestamp::from_secs_f64(-1.0);
        assert!(neg < Timestamp::ZERO);
    }

    #[test]
    fn next_tick_moves_forward_by_one_nanosecond() {
        let t = Timestamp::from_nanos(100);
        assert_eq!(t.next_tick().as_nanos(), 101);
    }
}
