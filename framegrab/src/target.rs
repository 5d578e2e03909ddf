use std::{fmt, str::FromStr, time::Duration};

/// Where in a video to take the frame from, in seconds from the start. Always finite and
/// non-negative.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct TargetSecond(f64);

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("'{0}' is neither a number of seconds nor a duration")]
    NotANumber(String),
    #[error("'{0}' is negative")]
    Negative(String),
    #[error("'{0}' is not finite")]
    NotFinite(String),
}

impl TargetSecond {
    pub const ZERO: Self = TargetSecond(0.0);

    pub fn new(secs: f64) -> Option<Self> {
        (secs.is_finite() && secs >= 0.0).then_some(TargetSecond(secs))
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0
    }

    /// Saturates for targets too large to be represented
    pub fn to_duration(self) -> Duration {
        Duration::try_from_secs_f64(self.0).unwrap_or(Duration::MAX)
    }
}

impl From<Duration> for TargetSecond {
    fn from(dur: Duration) -> Self {
        TargetSecond(dur.as_secs_f64())
    }
}

/// Accepts plain seconds, like `12.5`, or a humantime duration, like `1m 30s`.
impl FromStr for TargetSecond {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.parse::<f64>() {
            Ok(secs) if secs.is_nan() || secs.is_infinite() => {
                Err(ParseError::NotFinite(s.to_string()))
            }
            Ok(secs) if secs < 0.0 => Err(ParseError::Negative(s.to_string())),
            Ok(secs) => Ok(TargetSecond(secs)),
            Err(_) => humantime::parse_duration(trimmed)
                .map(TargetSecond::from)
                .map_err(|_| ParseError::NotANumber(s.to_string())),
        }
    }
}

impl fmt::Display for TargetSecond {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}
