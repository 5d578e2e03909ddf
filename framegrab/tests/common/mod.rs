// NOTE: every test will complain about the functions it doesn't use
#![allow(unused)]

use std::{
    path::{Path, PathBuf},
    process::Stdio,
    sync::Once,
};

use tempfile::TempDir;

pub const TEST_VIDEO_FPS: u64 = 25;
pub const TEST_VIDEO_LENGTH_SEC: u64 = 10;
pub const TEST_VIDEO_FRAMES: u64 = TEST_VIDEO_FPS * TEST_VIDEO_LENGTH_SEC;
pub const TEST_VIDEO_SIZE: (u32, u32) = (320, 240);

/// Returns cargo's tmpdir
pub fn cargo_tmpdir() -> PathBuf {
    PathBuf::from(option_env!("CARGO_TARGET_TMPDIR").expect("no cargo tmpdir???"))
}

/// A fresh directory inside cargo's tmpdir, removed when dropped
pub fn tmp_dir() -> TempDir {
    TempDir::new_in(cargo_tmpdir()).expect("could not create temporary dir")
}

/// A ten second long video with a moving test pattern, created once per test binary
pub fn test_video() -> PathBuf {
    let tmpvideo = cargo_tmpdir().join("framegrab testvideo.mkv");

    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        std::fs::remove_file(&tmpvideo).ok();
        run_ffmpeg(&[
            "-f",
            "lavfi",
            "-i",
            &format!(
                "testsrc=duration={TEST_VIDEO_LENGTH_SEC}:rate={TEST_VIDEO_FPS}:size={}x{}",
                TEST_VIDEO_SIZE.0, TEST_VIDEO_SIZE.1
            ),
            tmpvideo.to_str().expect("no probs, probably"),
        ]);
    });

    tmpvideo
}

/// A video with exactly one frame
pub fn single_frame_video() -> PathBuf {
    let tmpvideo = cargo_tmpdir().join("framegrab single.mkv");

    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        std::fs::remove_file(&tmpvideo).ok();
        run_ffmpeg(&[
            "-f",
            "lavfi",
            "-i",
            "testsrc=rate=25:size=64x48",
            "-frames:v",
            "1",
            tmpvideo.to_str().expect("no probs, probably"),
        ]);
    });

    tmpvideo
}

/// Something with a video extension that isn't a video at all
pub fn corrupt_video(dir: &Path) -> PathBuf {
    let path = dir.join("corrupt.mp4");
    std::fs::write(&path, b"this is not a video, just some bytes").expect("writable");
    path
}

/// A video stream without a single frame in it. A y4m file is just a header line
/// followed by the frames, so this has all the stream parameters but nothing to decode.
pub fn empty_video(dir: &Path) -> PathBuf {
    let path = dir.join("empty.y4m");
    std::fs::write(&path, b"YUV4MPEG2 W64 H48 F25:1 Ip A1:1 C420jpeg\n").expect("writable");
    path
}

fn run_ffmpeg(args: &[&str]) {
    let status = std::process::Command::new("ffmpeg")
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .stdin(Stdio::null())
        .status()
        .expect("failed to execute ffmpeg");
    assert!(status.success(), "ffmpeg failed to create a test video");
}
