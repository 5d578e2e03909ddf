pub mod error;
pub mod frame_extractor;
pub mod logger;
pub mod timestamp;
pub mod video_info;

pub use error::{FrameError, Result};
pub use frame_extractor::FrameExtractor;
pub use logger::ContextLogger;
pub use timestamp::Timestamp;
pub use video_info::VideoInfo;
