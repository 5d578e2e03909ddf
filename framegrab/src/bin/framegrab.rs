use std::{
    collections::HashSet,
    ffi::OsString,
    fs::File,
    io::BufWriter,
    num::NonZeroUsize,
    path::PathBuf,
};

use clap::Parser;
use color_eyre::eyre::{self, Context};
use framegrab::{
    batch::{error_chain, Batch, Item, LogProgress, Outcome},
    naming,
    report::{self, Report},
    snapshot::Snapshotter,
};
use framegrab_common::{
    bin_common::{
        init::{init_eyre, init_logger},
        termination,
    },
    utils::fsutils::{self, read_optional_file},
};

#[derive(Parser, Debug)]
#[command()]
/// Saves one frame from each video as a JPEG called `frame_<video name>.jpg`.
///
/// The frame is the one closest to `--at`, or the last one if the video is shorter than
/// that. Existing images with the same name are overwritten.
struct Cli {
    /// Where in the videos to take the frame from. Either seconds, like 12.5, or a
    /// duration, like 1m30s
    #[arg(long, short = 'a', default_value = "0")]
    at: String,

    /// Where to place the frames. Defaults to the picture directory
    #[arg(long, short = 'o')]
    outdir: Option<PathBuf>,

    /// JPEG quality, from 1 to 100
    #[arg(long, default_value_t = Snapshotter::DEFAULT_QUALITY,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Work on this many videos at once
    #[arg(long, short = 'j', default_value = "1")]
    jobs: NonZeroUsize,

    /// Also take all videos directly inside these folders
    #[arg(long, short = 's', num_args = 1..)]
    src_dirs: Vec<PathBuf>,

    /// Write a summary of what happened to every video to this file
    #[arg(long)]
    report: Option<PathBuf>,

    /// A file to additionally write the logs to
    #[arg(long)]
    logfile: Option<PathBuf>,

    /// Only log at this level and above: error, warn, info, debug or trace
    #[arg(long, default_value = "info", value_parser = parse_level)]
    log_level: log::LevelFilter,

    /// The videos to take frames from
    videos: Vec<PathBuf>,
}

fn parse_level(s: &str) -> Result<log::LevelFilter, String> {
    s.parse().map_err(|_| format!("'{s}' is not a log level"))
}

fn cli_arguments() -> eyre::Result<Cli> {
    const ARGS_FILE: &str = ".framegrabrc";
    let mut args: Vec<OsString> = std::env::args_os().collect();

    if args.len() == 1 {
        if let Some(flags) = read_optional_file(ARGS_FILE)
            .wrap_err_with(|| format!("Could not read config file at: {ARGS_FILE}"))?
        {
            args.extend(
                flags
                    .split_whitespace()
                    .map(|s| std::ffi::OsStr::new(s).to_owned()),
            );
        }
    }

    Ok(Cli::parse_from(args))
}

fn main() -> eyre::Result<()> {
    init_eyre()?;
    let cli = cli_arguments()?;
    init_logger(cli.logfile.as_deref(), cli.log_level)?;

    log::debug!("CLI arguments: {cli:#?}");

    let mut videos = cli.videos.clone();
    if !cli.src_dirs.is_empty() {
        log::info!("Finding all videos in: {:?}", cli.src_dirs);
        let found = fsutils::all_videos(&cli.src_dirs)
            .wrap_err("failed to list the videos in the src dirs")?;
        log::info!("Found {} videos", found.len());
        videos.extend(found);
    }
    eyre::ensure!(!videos.is_empty(), "No videos to take frames from");

    let outdir = cli.outdir.clone().unwrap_or_else(naming::default_output_dir);
    fsutils::ensure_dir(&outdir).wrap_err_with(|| {
        format!("failed to create the output dir at: {}", outdir.display())
    })?;
    log::info!("Saving frames to: {}", outdir.display());

    let items: Vec<Item> = videos.into_iter().map(Item::new).collect();
    warn_about_collisions(&items);

    let snapshotter = Snapshotter::new(outdir.clone()).quality(cli.quality);
    let term_cookie =
        termination::Cookie::new().wrap_err("failed to create term cookie")?;

    let outcome = Batch::new(items).jobs(cli.jobs).run(
        &cli.at,
        &snapshotter,
        &LogProgress,
        &term_cookie,
    );

    log::info!(
        "{} succeeded, {} failed, {} skipped",
        outcome.succeeded(),
        outcome.failed(),
        outcome.skipped()
    );

    if let Some(path) = &cli.report {
        let report = Report::new(cli.at.clone(), outdir, &outcome);
        let file = File::create(path)
            .wrap_err_with(|| format!("failed to create the report at: {}", path.display()))?;
        report::save_to(BufWriter::new(file), &report)
            .wrap_err("failed to write the report")?;
        log::info!("Wrote a report to: {}", path.display());
    }

    summarize(&outcome)
}

/// Videos with the same file name end up in the same image, only the last one survives
fn warn_about_collisions(items: &[Item]) {
    let mut seen = HashSet::new();
    for item in items {
        let output = naming::output_file_name(&item.name);
        if !seen.insert(output.clone()) {
            log::warn!(
                "'{}' will overwrite the frame of an earlier video, both are saved as {}",
                item.video.display(),
                output
            );
        }
    }
}

fn summarize(outcome: &Outcome) -> eyre::Result<()> {
    if outcome.all_succeeded() {
        return Ok(());
    }

    let mut lines = vec!["Summary of videos that errored:".to_string()];
    lines.extend(
        outcome
            .failures()
            .map(|(item, e)| format!("'{}': {}", item.video.display(), error_chain(e))),
    );
    match (outcome.skipped(), outcome.pending()) {
        (0, 0) => (),
        (skipped, 0) => lines.push(format!("{skipped} videos were skipped")),
        (skipped, pending) => lines.push(format!(
            "{skipped} videos were skipped and {pending} never finished"
        )),
    }
    eyre::bail!(lines.join("\n"));
}
