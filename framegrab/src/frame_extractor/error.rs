extern crate ffmpeg_next as ffmpeg;

pub type Result<T> = std::result::Result<T, FrameError>;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("failed to initialize ffmpeg")]
    Init(#[source] ffmpeg::Error),
    #[error("failed to open the file")]
    Open(#[source] ffmpeg::Error),
    #[error("no video stream")]
    NoVideoStream,
    #[error("no codec found, of type video (?)")]
    Codec(#[source] ffmpeg::Error),
    #[error("no pixel format")]
    NoPixelFormat,
    #[error("failed to create the pixel format converter")]
    Converter(#[source] ffmpeg::Error),
    #[error("failed to seek to {target} in timebase {timebase}")]
    Seek {
        target: i64,
        timebase: String,
        #[source]
        source: ffmpeg::Error,
    },
    #[error("failed to read a packet from the stream")]
    ReadPacket(#[source] ffmpeg::Error),
    #[error("failed to send EOF to the decoder")]
    SendEof(#[source] ffmpeg::Error),
    #[error("decoder error when receiving a frame from it")]
    Receive(#[source] ffmpeg::Error),
    #[error("failed to convert the decoded frame")]
    Convert(#[source] ffmpeg::Error),
}
