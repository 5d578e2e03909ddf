use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use image::{codecs::jpeg::JpegEncoder, ColorType, ImageError, RgbImage};

use crate::{
    frame_extractor::{
        logger::Logger, ContextLogger, FrameError, FrameExtractor, Timestamp, VideoInfo,
    },
    naming,
    target::{ParseError, TargetSecond},
};

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("could not open '{}' as a video", .video.display())]
    Open {
        video: PathBuf,
        #[source]
        source: FrameError,
    },
    #[error("could not decode a frame from '{}'", .video.display())]
    Decode {
        video: PathBuf,
        #[source]
        source: Option<FrameError>,
    },
    #[error("could not write the frame to '{}'", .output.display())]
    Write {
        output: PathBuf,
        #[source]
        source: ImageError,
    },
    #[error("invalid target second")]
    Parse(#[from] ParseError),
    #[error("panicked while processing '{}': {message}", .video.display())]
    Panic { video: PathBuf, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    Open,
    Decode,
    Write,
    Parse,
    Panic,
}

impl ExtractError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExtractError::Open { .. } => ErrorKind::Open,
            ExtractError::Decode { .. } => ErrorKind::Decode,
            ExtractError::Write { .. } => ErrorKind::Write,
            ExtractError::Parse(_) => ErrorKind::Parse,
            ExtractError::Panic { .. } => ErrorKind::Panic,
        }
    }
}

/// A frame that was written to disk
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub output: PathBuf,
    pub timestamp: Timestamp,
}

/// How to get to the wanted frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeekPlan {
    /// The first frame at or after this time
    Time(Duration),
    /// The target is past the end, or the length is unknown. Take the last frame.
    LastFrame { index: u64 },
}

pub fn plan_seek(info: &VideoInfo, target: TargetSecond) -> SeekPlan {
    if target.as_secs_f64() < info.duration_secs() {
        SeekPlan::Time(target.to_duration())
    } else {
        SeekPlan::LastFrame {
            index: info.total_frames.saturating_sub(1),
        }
    }
}

/// Saves single frames from videos as JPEGs into a directory.
#[derive(Debug, Clone)]
pub struct Snapshotter {
    out_dir: PathBuf,
    quality: u8,
}

impl Snapshotter {
    pub const DEFAULT_QUALITY: u8 = 95;

    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            quality: Self::DEFAULT_QUALITY,
        }
    }

    /// JPEG quality, clamped to 1..=100
    pub fn quality(mut self, quality: u8) -> Self {
        self.quality = quality.clamp(1, 100);
        self
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Takes the frame closest to `target` from `video` and saves it as
    /// `frame_<name>.jpg` in the output directory, replacing anything already there.
    /// Returns where it ended up.
    pub fn extract(
        &self,
        video: &Path,
        target: TargetSecond,
        name: &str,
    ) -> Result<Snapshot, ExtractError> {
        let (timestamp, img) = grab_frame(video, target)?;

        let output = naming::output_path(&self.out_dir, name);
        save_jpeg(&img, &output, self.quality).map_err(|source| ExtractError::Write {
            output: output.clone(),
            source,
        })?;
        log::debug!(
            "Wrote the frame at {} of '{}' to '{}'",
            timestamp,
            video.display(),
            output.display()
        );

        Ok(Snapshot { output, timestamp })
    }
}

/// Decodes the frame closest to `target`, or the last one if the video is shorter than
/// that. The video is closed again before this returns.
pub fn grab_frame(
    video: &Path,
    target: TargetSecond,
) -> Result<(Timestamp, RgbImage), ExtractError> {
    let decode_err = |source: FrameError| ExtractError::Decode {
        video: video.to_path_buf(),
        source: Some(source),
    };

    let mut extractor = FrameExtractor::new_with_logger(video, ContextLogger::new(video))
        .map_err(|source| ExtractError::Open {
            video: video.to_path_buf(),
            source,
        })?;

    let info = extractor.info();
    log::debug!(
        "'{}' has {} frames at {:.3} fps, approx {} long",
        video.display(),
        info.total_frames,
        info.fps,
        humantime::Duration::from(extractor.approx_length())
    );

    let frame = match plan_seek(&info, target) {
        SeekPlan::Time(at) => {
            extractor.seek_to_time(at).map_err(decode_err)?;
            match extractor.next().map_err(decode_err)? {
                Some(frame) => Some(frame),
                None => {
                    log::debug!(
                        "No frame starts at or after {} in '{}', taking the last frame instead",
                        target,
                        video.display()
                    );
                    last_frame(&mut extractor, info.total_frames.saturating_sub(1))
                        .map_err(decode_err)?
                }
            }
        }
        SeekPlan::LastFrame { index } => {
            log::debug!(
                "{} is past the end of '{}', taking the last frame",
                target,
                video.display()
            );
            last_frame(&mut extractor, index).map_err(decode_err)?
        }
    };

    frame.ok_or_else(|| ExtractError::Decode {
        video: video.to_path_buf(),
        source: None,
    })
}

fn last_frame<L: Logger>(
    extractor: &mut FrameExtractor<L>,
    index: u64,
) -> Result<Option<(Timestamp, RgbImage)>, FrameError> {
    extractor.seek_to_frame(index)?;
    if let Some(frame) = extractor.last_frame()? {
        return Ok(Some(frame));
    }

    // The frame count was probably off, go through the whole thing instead
    log::debug!("Nothing after frame {index}, retrying from the beginning");
    extractor.seek_to_beginning()?;
    extractor.last_frame()
}

fn save_jpeg(img: &RgbImage, output: &Path, quality: u8) -> image::ImageResult<()> {
    let mut writer = BufWriter::new(File::create(output).map_err(ImageError::IoError)?);
    JpegEncoder::new_with_quality(&mut writer, quality).encode(
        img.as_raw(),
        img.width(),
        img.height(),
        ColorType::Rgb8,
    )?;
    writer.flush().map_err(ImageError::IoError)
}

#[cfg(test)]
mod test {
    use super::*;

    fn info(fps: f64, total_frames: u64) -> VideoInfo {
        VideoInfo { fps, total_frames }
    }

    fn secs(s: f64) -> TargetSecond {
        TargetSecond::new(s).expect("valid")
    }

    #[test]
    fn within_the_video_seeks_by_time() {
        assert_eq!(
            SeekPlan::Time(Duration::from_millis(2500)),
            plan_seek(&info(25.0, 250), secs(2.5))
        );
        assert_eq!(
            SeekPlan::Time(Duration::ZERO),
            plan_seek(&info(25.0, 250), secs(0.0))
        );
    }

    #[test]
    fn past_the_end_takes_the_last_frame() {
        assert_eq!(
            SeekPlan::LastFrame { index: 249 },
            plan_seek(&info(25.0, 250), secs(10.0))
        );
        assert_eq!(
            SeekPlan::LastFrame { index: 249 },
            plan_seek(&info(25.0, 250), secs(3600.0))
        );
    }

    #[test]
    fn unknown_length_takes_the_last_frame() {
        assert_eq!(
            SeekPlan::LastFrame { index: 9 },
            plan_seek(&info(0.0, 10), secs(0.0))
        );
        assert_eq!(
            SeekPlan::LastFrame { index: 0 },
            plan_seek(&info(30.0, 0), secs(1.0))
        );
    }

    #[test]
    fn error_kinds() {
        let parse: ExtractError = ParseError::Negative("-1".into()).into();
        assert_eq!(ErrorKind::Parse, parse.kind());

        let open = ExtractError::Open {
            video: "a.mp4".into(),
            source: FrameError::NoVideoStream,
        };
        assert_eq!(ErrorKind::Open, open.kind());
        assert_eq!("could not open 'a.mp4' as a video", open.to_string());

        let decode = ExtractError::Decode {
            video: "a.mp4".into(),
            source: None,
        };
        assert_eq!(ErrorKind::Decode, decode.kind());
    }

    #[test]
    fn jpeg_is_written_and_overwritten() -> image::ImageResult<()> {
        let dir = tempfile::tempdir()?;
        let output = dir.path().join("frame_x.jpg");

        let red = RgbImage::from_pixel(16, 8, image::Rgb([255, 0, 0]));
        save_jpeg(&red, &output, 95)?;
        let first = std::fs::read(&output)?;

        let blue = RgbImage::from_pixel(16, 8, image::Rgb([0, 0, 255]));
        save_jpeg(&blue, &output, 95)?;
        let second = std::fs::read(&output)?;
        assert_ne!(first, second);

        let decoded = image::open(&output)?.to_rgb8();
        assert_eq!((16, 8), decoded.dimensions());
        let px = decoded.get_pixel(8, 4);
        assert!(px[2] > 200 && px[0] < 50, "{px:?}");
        Ok(())
    }

    #[test]
    fn unwritable_directory_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output = dir.path().join("missing").join("frame_x.jpg");
        let img = RgbImage::new(2, 2);
        assert!(matches!(
            save_jpeg(&img, &output, 95),
            Err(ImageError::IoError(_))
        ));
    }
}
