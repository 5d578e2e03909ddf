use std::path::{Path, PathBuf};

const OUTPUT_PREFIX: &str = "frame_";
const OUTPUT_EXTENSION: &str = "jpg";

/// Turns a user supplied name into something that is safe to use as a single file name.
/// Everything up to the last path separator, of any platform, is stripped. Spaces and
/// characters that some file systems reject become underscores.
pub fn sanitize_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);

    let cleaned: String = base
        .chars()
        .map(|c| match c {
            ' ' | '<' | '>' | ':' | '"' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if cleaned.chars().all(|c| c == '.') {
        "_".to_string()
    } else {
        cleaned
    }
}

/// The file name the frame from the video called `name` is saved as
pub fn output_file_name(name: &str) -> String {
    format!("{OUTPUT_PREFIX}{}.{OUTPUT_EXTENSION}", sanitize_name(name))
}

pub fn output_path(dir: impl AsRef<Path>, name: &str) -> PathBuf {
    dir.as_ref().join(output_file_name(name))
}

/// The name to show for a video, which is its file name
pub fn display_name(video: impl AsRef<Path>) -> String {
    let video = video.as_ref();
    video
        .file_name()
        .unwrap_or(video.as_os_str())
        .to_string_lossy()
        .into_owned()
}

/// Where frames are saved unless told otherwise: the picture directory of the user,
/// falling back to the home directory and lastly the current directory.
pub fn default_output_dir() -> PathBuf {
    dirs::picture_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}
