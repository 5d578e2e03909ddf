use std::fmt;
use std::time::Duration;

use ffmpeg::{Rational, Rescale};

extern crate ffmpeg_next as ffmpeg;

const MICROS: Rational = Rational(1, 1_000_000);

/// A presentation timestamp of a frame, in the timebase of the stream it came from.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct Timestamp {
    pub(super) timebase_numerator: i32,
    pub(super) timebase_denominator: i32,
    pub(super) timestamp: i64,
    pub(super) first_timestamp: i64,
}

impl Timestamp {
    pub(super) fn new(ts: i64, timebase: Rational, first_timestamp: i64) -> Self {
        Self {
            timestamp: ts,
            first_timestamp,
            timebase_numerator: timebase.numerator(),
            timebase_denominator: timebase.denominator(),
        }
    }

    /// A timestamp relative to nothing, i.e., where the first timestamp is zero
    pub(super) fn new_abs(ts: i64, timebase: Rational) -> Self {
        Self::new(ts, timebase, 0)
    }

    pub fn from_duration(dur: Duration) -> Self {
        let micros = dur.as_micros().try_into().unwrap_or(i64::MAX);
        Self::new_abs(micros, MICROS)
    }

    fn timebase(&self) -> Rational {
        Rational::new(self.timebase_numerator, self.timebase_denominator)
    }

    /// The distance from the first timestamp, expressed in `timebase`
    pub(super) fn timestamp(&self, timebase: Rational) -> i64 {
        (self.timestamp - self.first_timestamp).rescale(self.timebase(), timebase)
    }

    /// The distance from the first timestamp. Timestamps before the first one are
    /// clamped to zero.
    pub fn to_duration(&self) -> Duration {
        let micros = self.timestamp(MICROS);
        Duration::from_micros(micros.max(0).try_into().expect("is not negative"))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut millis = self.timestamp(Rational::new(1, 1000));

        let negative = if millis < 0 {
            millis = -millis;
            "-"
        } else {
            ""
        };

        let subsec = millis % 1000;
        let total = millis / 1000;
        let hours = total / 3600;
        let minutes = (total % 3600) / 60;
        let seconds = total % 60;

        write!(
            f,
            "{}{:02}:{:02}:{:02}.{:03}",
            negative, hours, minutes, seconds, subsec
        )
    }
}
