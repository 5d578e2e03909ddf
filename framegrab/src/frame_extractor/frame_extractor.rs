extern crate ffmpeg_next as ffmpeg;

use std::cell::RefCell;
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use super::error::{FrameError, Result};
use super::logger::{self, fault, verbose, warning, Item};
use super::timestamp::Timestamp;
use super::video_info::VideoInfo;

use ffmpeg::codec::Context as CodecContext;
use ffmpeg::decoder::Video as DecoderVideo;
use ffmpeg::format::context::Input as FormatContext;
use ffmpeg::format::{input_with_dictionary, Pixel};
use ffmpeg::frame::Video as FrameVideo;
use ffmpeg::media::Type;
use ffmpeg::software::scaling::context::Context as ScalingContext;
use ffmpeg::util::log as ffmpeglog;
use ffmpeg::{Dictionary, Packet as CodecPacket, Rational, Rescale};
use ffmpeg_sys_next::{AV_NOPTS_VALUE, AV_TIME_BASE_Q};
use image::RgbImage;

static FFMPEG_INITIALIZED: OnceLock<std::result::Result<(), ffmpeg::Error>> =
    OnceLock::new();

/// An opened video file that frames can be decoded from. The file is closed when this is
/// dropped.
pub struct FrameExtractor<L: logger::Logger = logger::LogLogger> {
    logger: L,

    // ffmpeg contexts
    ictx: FormatContext,
    decoder: DecoderVideo,
    converter: ScalingContext,

    // internal timestamp bookkeeping
    seek_target_timestamp: i64,
    cur_timestamp: i64,

    // constants/metadata
    end_timestamp: i64,
    first_timestamp: i64,
    timebase: Rational,
    video_stream_index: usize,
    orientation: Orientation,
    info: VideoInfo,
}

thread_local! {
    static LOGS: RefCell<Vec<Item>> = const {RefCell::new(Vec::new())};
}

impl FrameExtractor<logger::LogLogger> {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new_with_logger(path, logger::LogLogger)
    }
}

impl<L> FrameExtractor<L>
where
    L: logger::Logger,
{
    pub fn new_with_logger(path: impl AsRef<Path>, logger: L) -> Result<Self> {
        if let Err(e) = FFMPEG_INITIALIZED.get_or_init(|| {
            ffmpeg::init()?;
            ffmpeglog::set_level(ffmpeglog::Level::Warning);
            unsafe {
                ffmpeg_sys_next::av_log_set_callback(Some(ffmpeg_log_adaptor));
            }
            Ok(())
        }) {
            return Err(FrameError::Init(*e));
        }

        let options = {
            let mut options = Dictionary::new();
            options.set("analyzeduration", "10M");
            options.set("probesize", "5M"); // this is the default
            options
        };
        // ffmpeg might have logged something about why it failed
        let fail = |e: FrameError| {
            Self::flush_logs_to(&logger);
            e
        };

        let mut ictx = input_with_dictionary(&path, options)
            .map_err(FrameError::Open)
            .map_err(&fail)?;

        let video = ictx
            .streams()
            .best(Type::Video)
            .ok_or(FrameError::NoVideoStream)
            .map_err(&fail)?;

        let video_stream_index = video.index();
        let timebase = video.time_base();

        let first_timestamp = if video.start_time() == AV_NOPTS_VALUE {
            verbose!(logger, "Does not have a start time, assuming zero");
            0
        } else {
            video.start_time()
        };

        let duration = if video.duration() != AV_NOPTS_VALUE {
            Some(video.duration())
        } else if ictx.duration() != AV_NOPTS_VALUE {
            Some(ictx.duration().rescale(AV_TIME_BASE_Q, timebase))
        } else {
            None
        };
        let end_timestamp = match duration {
            Some(dur) if dur >= 0 => first_timestamp + dur,
            Some(_) => {
                warning!(logger, "Has a negative duration, treating it as empty");
                first_timestamp
            }
            None => {
                warning!(logger, "Does not have a duration, treating it as empty");
                first_timestamp
            }
        };

        let fps = [video.avg_frame_rate(), video.rate()]
            .into_iter()
            .find(|rate| rate.numerator() > 0 && rate.denominator() > 0)
            .map(f64::from)
            .unwrap_or(0.0);

        let total_frames = match u64::try_from(video.frames()) {
            Ok(frames) if frames > 0 => frames,
            _ => VideoInfo::estimate_frames(
                fps,
                Timestamp::new(end_timestamp, timebase, first_timestamp).to_duration(),
            ),
        };

        let orientation = match get_orientation(&video) {
            Some(x) => x,
            None => {
                warning!(logger, "Got a weird orientation angle, ignoring");
                Orientation::Normal
            }
        };

        let decoder = CodecContext::from_parameters(video.parameters())
            .and_then(|codec| codec.decoder().video())
            .map_err(FrameError::Codec)
            .map_err(&fail)?;

        let converter = Self::pixel_converter(&decoder).map_err(&fail)?;

        ictx.streams_mut()
            .filter(|stream| stream.index() != video_stream_index)
            .for_each(|mut stream| stream_set_discard_all(&mut stream));

        let myself = Self {
            logger,
            ictx,
            decoder,
            video_stream_index,
            converter,
            cur_timestamp: first_timestamp,
            end_timestamp,
            seek_target_timestamp: first_timestamp,
            first_timestamp,
            timebase,
            orientation,
            info: VideoInfo { fps, total_frames },
        };
        myself.log_ffmpeg_logs();
        Ok(myself)
    }

    fn log_ffmpeg_logs(&self) {
        Self::flush_logs_to(&self.logger)
    }

    fn flush_logs_to(logger: &L) {
        LOGS.with_borrow_mut(|vec| {
            for item in vec.drain(..) {
                logger.log_item(item);
            }
        })
    }

    fn pixel_converter(decoder: &DecoderVideo) -> Result<ScalingContext> {
        if decoder.format() == Pixel::None {
            return Err(FrameError::NoPixelFormat);
        }
        ScalingContext::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            // http://git.videolan.org/?p=ffmpeg.git;a=blob;f=libavutil/pixfmt.h;hb=HEAD
            Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::Flags::FAST_BILINEAR,
        )
        .map_err(FrameError::Converter)
    }

    pub fn info(&self) -> VideoInfo {
        self.info
    }

    /// Decodes the next frame at or after the latest seek target.
    pub fn next(&mut self) -> Result<Option<(Timestamp, RgbImage)>> {
        match self.next_decoded()? {
            Some(frame) => {
                let img = self.convert(&frame)?;
                Ok(Some((self.timestamp_at(self.cur_timestamp), img)))
            }
            None => Ok(None),
        }
    }

    /// Decodes everything that is left and returns the final frame. Frames before the
    /// seek target are also considered, so this finds something as long as the last seek
    /// landed on a keyframe before the end.
    pub fn last_frame(&mut self) -> Result<Option<(Timestamp, RgbImage)>> {
        self.seek_target_timestamp = i64::MIN;

        let mut last = None;
        while let Some(frame) = self.next_decoded()? {
            last = Some((self.cur_timestamp, frame));
        }

        match last {
            Some((ts, frame)) => {
                let img = self.convert(&frame)?;
                Ok(Some((self.timestamp_at(ts), img)))
            }
            None => Ok(None),
        }
    }

    fn timestamp_at(&self, ts: i64) -> Timestamp {
        Timestamp::new(ts, self.timebase, self.first_timestamp)
    }

    fn convert(&mut self, frame: &FrameVideo) -> Result<RgbImage> {
        let mut converted = FrameVideo::empty();
        self.converter
            .run(frame, &mut converted)
            .map_err(FrameError::Convert)?;
        let img = create_rust_image(converted);
        Ok(undo_rotation(img, self.orientation))
    }

    fn next_decoded(&mut self) -> Result<Option<FrameVideo>> {
        loop {
            loop {
                let mut frame = FrameVideo::empty();
                // avcodec_receive_frame
                // https://ffmpeg.org/doxygen/trunk/group__lavc__decoding.html#ga11e6542c4e66d3028668788a1a74217c
                match {
                    let ret = self.decoder.receive_frame(&mut frame);
                    self.log_ffmpeg_logs();
                    ret
                } {
                    Ok(()) => (),
                    Err(ffmpeg::Error::Other {
                        errno: libc::EAGAIN,
                    }) => break,
                    // End of stream situations.
                    // https://ffmpeg.org/doxygen/trunk/avcodec_8h_source.html
                    Err(ffmpeg::Error::Eof) => return Ok(None),
                    Err(e) => return Err(FrameError::Receive(e)),
                }

                if let Some(ts) = frame.timestamp() {
                    self.cur_timestamp = ts;
                } else {
                    warning!(
                        self.logger,
                        "Frame doesn't have a timestamp somewhere after: {}",
                        self.timestamp_at(self.cur_timestamp)
                    );
                    continue;
                }

                if self.cur_timestamp < self.seek_target_timestamp {
                    continue;
                }

                return Ok(Some(frame));
            }

            loop {
                // http://ffmpeg.org/doxygen/trunk/group__lavf__decoding.html#ga4fdb3084415a82e3810de6ee60e46a61
                let mut packet = CodecPacket::empty();
                match {
                    let ret = packet.read(&mut self.ictx);
                    self.log_ffmpeg_logs();
                    ret
                } {
                    Ok(()) if packet.stream() == self.video_stream_index => {
                        match {
                            let ret = self.decoder.send_packet(&packet);
                            self.log_ffmpeg_logs();
                            ret
                        } {
                            Ok(()) => break,
                            Err(e) => {
                                fault!(self.logger, "Failed to decode frame: {}", e);
                                continue;
                            }
                        }
                    }
                    Ok(()) => continue,
                    Err(ffmpeg::Error::Eof) => {
                        self.decoder.send_eof().map_err(FrameError::SendEof)?;
                        break;
                    }
                    Err(e) => return Err(FrameError::ReadPacket(e)),
                }
            }
        }
    }

    /// Seeks so that the next frame is the first one at or after `dur` from the start.
    pub fn seek_to_time(&mut self, dur: Duration) -> Result<()> {
        let target = self.first_timestamp
            + Timestamp::from_duration(dur).timestamp(self.timebase);
        self.seek_internal(target)
    }

    /// Seeks to where the frame at `index` should be, judging by the frame rate.
    pub fn seek_to_frame(&mut self, index: u64) -> Result<()> {
        self.seek_to_time(self.info.time_of_frame(index))
    }

    pub fn seek_to_beginning(&mut self) -> Result<()> {
        self.seek_internal(self.first_timestamp)
    }

    fn seek_internal(&mut self, target: i64) -> Result<()> {
        let stream_index = self.video_stream_index;

        // Prefer a keyframe at or before the target, so that no frame in between is
        // missed. Some demuxers can't do that near the start, so take anything then.
        let res = seek(&mut self.ictx, stream_index, i64::MIN, target, target)
            .or_else(|e| {
                verbose!(self.logger, "Bounded seek to {} failed ({}), retrying", target, e);
                seek(&mut self.ictx, stream_index, i64::MIN, target, i64::MAX)
            });
        self.log_ffmpeg_logs();
        res.map_err(|source| FrameError::Seek {
            target,
            timebase: format!(
                "{}/{}",
                self.timebase.numerator(),
                self.timebase.denominator()
            ),
            source,
        })?;

        self.decoder.flush();
        self.seek_target_timestamp = target;
        Ok(())
    }

    pub fn approx_length(&self) -> Duration {
        self.timestamp_at(self.end_timestamp).to_duration()
    }
}

impl<L: logger::Logger> Drop for FrameExtractor<L> {
    fn drop(&mut self) {
        self.log_ffmpeg_logs();
    }
}

#[derive(Clone, Copy)]
enum Orientation {
    Normal,
    Left,
    Right,
    Upside,
}

fn get_orientation(video: &ffmpeg::Stream) -> Option<Orientation> {
    for data in video.side_data() {
        if data.kind() != ffmpeg::packet::side_data::Type::DisplayMatrix {
            continue;
        }
        let rot = unsafe {
            ffmpeg_sys_next::av_display_rotation_get(data.data().as_ptr() as *const i32)
        };

        if rot.is_finite() {
            return match rot.round() as i32 {
                -90 => Some(Orientation::Right),
                90 => Some(Orientation::Left),
                0 => Some(Orientation::Normal),
                180 | -180 => Some(Orientation::Upside),
                _ => None,
            };
        }
    }

    Some(Orientation::Normal)
}

fn undo_rotation(img: RgbImage, ori: Orientation) -> RgbImage {
    match ori {
        Orientation::Normal => img,
        Orientation::Right => image::imageops::rotate90(&img),
        Orientation::Left => image::imageops::rotate270(&img),
        Orientation::Upside => image::imageops::rotate180(&img),
    }
}

fn create_rust_image(converted: FrameVideo) -> RgbImage {
    assert_eq!(Pixel::RGB24, converted.format());
    assert_eq!(1, converted.planes());

    let src_linesize = converted.stride(0);
    let width: usize = converted.width().try_into().expect("will always fit");
    let height: usize = converted.height().try_into().expect("will always fit");
    let data = converted.data(0);
    let trg_linesize = 3 * width;

    // https://stackoverflow.com/a/57666844
    let data = if src_linesize == trg_linesize {
        data[..trg_linesize * height].to_vec()
    } else {
        assert!(src_linesize >= trg_linesize);
        let mut nopadding = vec![0; trg_linesize * height];
        for i in 0..height {
            nopadding[(i * trg_linesize)..((i + 1) * trg_linesize)].copy_from_slice(
                &data[(i * src_linesize)..(i * src_linesize + trg_linesize)],
            );
        }
        nopadding
    };

    RgbImage::from_vec(
        width.try_into().expect("was an u32 before"),
        height.try_into().expect("was an u32 before"),
        data,
    )
    .expect("the buffer is big enough!")
}

fn stream_set_discard_all(stream: &mut ffmpeg::StreamMut<'_>) {
    unsafe {
        let ptr = stream.as_mut_ptr();
        if !ptr.is_null() {
            (*ptr).discard = ffmpeg_sys_next::AVDiscard::AVDISCARD_ALL;
        }
    }
}

/// Like FormatContext::seek, except that this seeks on a specific stream, in that
/// stream's timebase.
fn seek(
    input: &mut FormatContext,
    stream_index: usize,
    min_ts: i64,
    ts: i64,
    max_ts: i64,
) -> std::result::Result<(), ffmpeg::Error> {
    unsafe {
        match ffmpeg_sys_next::avformat_seek_file(
            input.as_mut_ptr(),
            stream_index
                .try_into()
                .expect("will probably not be that big"),
            min_ts,
            ts,
            max_ts,
            0,
        ) {
            s if s >= 0 => Ok(()),
            e => Err(ffmpeg::Error::from(e)),
        }
    }
}

impl<L: logger::Logger> fmt::Debug for FrameExtractor<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            first_timestamp,
            end_timestamp,
            timebase,
            cur_timestamp,
            seek_target_timestamp,
            info,
            ..
        } = self;

        f.debug_struct("FrameExtractor")
            .field("first_ts", first_timestamp)
            .field("last_ts", end_timestamp)
            .field("cur_ts", cur_timestamp)
            .field(
                "tb",
                &format_args!("{}/{}", timebase.numerator(), timebase.denominator()),
            )
            .field("seek_ts", seek_target_timestamp)
            .field("info", info)
            .finish()
    }
}

extern "C" {
    pub fn vsnprintf(
        strbuf: *mut libc::c_char,
        size: libc::size_t,
        format: *const libc::c_char,
        va_list: *mut libc::c_void,
    ) -> libc::c_int;
}

unsafe extern "C" fn ffmpeg_log_adaptor(
    avcl: *mut libc::c_void,
    level: libc::c_int,
    fmt: *const libc::c_char,
    va_list: *mut ffmpeg_sys_next::__va_list_tag,
) {
    if level > ffmpeg_sys_next::av_log_get_level() {
        return;
    }

    const BUF_SIZE: usize = 2048;
    let mut buffer: Vec<u8> = vec![1; BUF_SIZE];
    let retval = vsnprintf(
        buffer.as_mut_ptr() as *mut libc::c_char,
        BUF_SIZE,
        fmt,
        va_list as *mut libc::c_void,
    );

    match retval {
        ..=-1 => {
            let errno = std::io::Error::last_os_error();
            eprintln!(
                "failed to create log message from ffmpeg, vsnprintf returned: {errno}"
            );
            return;
        }
        written => {
            let written: usize = written.try_into().expect("is not negative");
            buffer.truncate(written.min(BUF_SIZE - 1))
        }
    }

    let mut body = String::from_utf8_lossy(&buffer).into_owned();
    body.truncate(body.trim_end().len());

    let class_name = {
        if avcl.is_null() {
            "NULL_avcl".into()
        } else {
            let avc = *(avcl as *const *const ffmpeg_sys_next::AVClass);
            if avc.is_null() {
                "NULL_avc".into()
            } else if let Some(fun) = (*avc).item_name {
                let item = std::ffi::CStr::from_ptr(fun(avcl)).to_string_lossy();
                if item == "NULL" {
                    std::ffi::CStr::from_ptr((*avc).class_name).to_string_lossy()
                } else {
                    item
                }
            } else {
                "NULL_item".into()
            }
        }
    };

    let level = ffmpeglog::Level::try_from(level)
        .map(logger::Level::from)
        .unwrap_or(logger::Level::Info);

    LOGS.with_borrow_mut(|vec| {
        vec.push(Item {
            level,
            target: format!("ffmpeg::{class_name}"),
            body,
        })
    });
}
