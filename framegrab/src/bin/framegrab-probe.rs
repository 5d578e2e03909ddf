use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::{self, Context};
use framegrab::{
    frame_extractor::FrameExtractor,
    snapshot::{plan_seek, SeekPlan},
    target::TargetSecond,
};
use framegrab_common::bin_common::init::{init_eyre, init_logger};

#[derive(Parser)]
#[command()]
/// Show what framegrab knows about a video, and which frame it would pick
struct Cli {
    /// The target to plan for
    #[arg(long, short = 'a', default_value = "0")]
    at: TargetSecond,

    /// The video file to look at
    videofile: PathBuf,
}

fn main() -> eyre::Result<()> {
    init_eyre()?;
    init_logger(None, log::LevelFilter::Info)?;
    let cli = Cli::parse();

    let extractor = FrameExtractor::new(&cli.videofile)
        .wrap_err_with(|| format!("failed to open {}", cli.videofile.display()))?;
    let info = extractor.info();

    println!("frame rate:   {:.3} fps", info.fps);
    println!("frames:       {}", info.total_frames);
    println!("duration:     {:.3}s", info.duration_secs());
    println!(
        "container:    {}",
        humantime::Duration::from(extractor.approx_length())
    );
    match plan_seek(&info, cli.at) {
        SeekPlan::Time(at) => {
            println!("{} -> seek to {}", cli.at, humantime::Duration::from(at))
        }
        SeekPlan::LastFrame { index } => {
            println!("{} -> last frame, index {}", cli.at, index)
        }
    }

    Ok(())
}
