use std::time::Duration;

/// What is known about the video stream up front, before decoding anything.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    /// Frames per second, zero if unknown
    pub fps: f64,
    /// Number of frames, possibly estimated from the duration
    pub total_frames: u64,
}

impl VideoInfo {
    /// The length in seconds as implied by the frame count. Zero if the frame rate is
    /// unknown.
    pub fn duration_secs(&self) -> f64 {
        if self.fps > 0.0 {
            self.total_frames as f64 / self.fps
        } else {
            0.0
        }
    }

    /// The presentation time of the frame at `index`, assuming a constant frame rate
    pub fn time_of_frame(&self, index: u64) -> Duration {
        if self.fps > 0.0 {
            Duration::try_from_secs_f64(index as f64 / self.fps).unwrap_or(Duration::MAX)
        } else {
            Duration::ZERO
        }
    }

    /// Estimates the frame count from a duration, as containers without an explicit
    /// count need.
    pub(super) fn estimate_frames(fps: f64, duration: Duration) -> u64 {
        if fps > 0.0 {
            (duration.as_secs_f64() * fps).round() as u64
        } else {
            0
        }
    }
}
