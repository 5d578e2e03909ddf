use std::{
    error::Error,
    num::NonZeroUsize,
    panic::{self, AssertUnwindSafe},
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
    time::Instant,
};

use color_eyre::eyre;
use framegrab_common::{
    bin_common::termination::Cookie,
    utils::{
        work_queue::WorkQueue,
        workers::{scoped_workers, CaughtPanic, FinishedWorker},
    },
};

use crate::{
    naming,
    snapshot::{ExtractError, Snapshot, Snapshotter},
    target::TargetSecond,
};

/// A video to take a frame from, and the name to save it under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub video: PathBuf,
    pub name: String,
}

impl Item {
    /// Named after the file name of the video
    pub fn new(video: impl Into<PathBuf>) -> Self {
        let video = video.into();
        let name = naming::display_name(&video);
        Self { video, name }
    }

    pub fn with_name(video: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            video: video.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug)]
pub enum Status {
    Pending,
    Success(Snapshot),
    Failure(ExtractError),
    Skipped,
}

impl Status {
    pub fn is_success(&self) -> bool {
        matches!(self, Status::Success(_))
    }
}

/// Something that can take a frame from a video, normally a [`Snapshotter`].
pub trait Extract {
    fn extract(
        &self,
        video: &Path,
        target: TargetSecond,
        name: &str,
    ) -> Result<Snapshot, ExtractError>;
}

impl Extract for Snapshotter {
    fn extract(
        &self,
        video: &Path,
        target: TargetSecond,
        name: &str,
    ) -> Result<Snapshot, ExtractError> {
        Snapshotter::extract(self, video, target, name)
    }
}

/// Gets told how the batch is going. Can be called from several threads at once.
pub trait Progress {
    fn started(&self, index: usize, total: usize, item: &Item);
    fn finished(&self, index: usize, total: usize, item: &Item, status: &Status);
}

/// Reports progress through the log.
pub struct LogProgress;

impl Progress for LogProgress {
    fn started(&self, index: usize, total: usize, item: &Item) {
        log::info!(
            "Progress: {}/{} videos, processing '{}'",
            index + 1,
            total,
            item.video.display()
        );
    }

    fn finished(&self, _index: usize, _total: usize, item: &Item, status: &Status) {
        match status {
            Status::Success(snapshot) => log::info!(
                "Done: {} -> {} (frame at {})",
                item.name,
                snapshot.output.display(),
                snapshot.timestamp
            ),
            Status::Failure(e) => log::error!("Error on {}: {}", item.name, error_chain(e)),
            Status::Skipped => log::warn!("Skipped {}", item.name),
            Status::Pending => (),
        }
    }
}

/// All messages from `err` and its sources, separated by colons
pub fn error_chain(err: &(dyn Error + 'static)) -> String {
    eyre::Chain::new(err)
        .map(|cause| cause.to_string())
        .collect::<Vec<_>>()
        .join(": ")
}

pub struct Entry {
    pub item: Item,
    pub status: Status,
}

pub struct Outcome {
    pub entries: Vec<Entry>,
}

impl Outcome {
    fn count(&self, pred: impl Fn(&Status) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(&e.status)).count()
    }

    pub fn succeeded(&self) -> usize {
        self.count(Status::is_success)
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, Status::Failure(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, Status::Skipped))
    }

    pub fn pending(&self) -> usize {
        self.count(|s| matches!(s, Status::Pending))
    }

    pub fn all_succeeded(&self) -> bool {
        self.succeeded() == self.entries.len()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Item, &ExtractError)> {
        self.entries.iter().filter_map(|e| match &e.status {
            Status::Failure(err) => Some((&e.item, err)),
            _ => None,
        })
    }
}

/// Takes one frame from each of a list of videos. One failing video does not stop the
/// others.
pub struct Batch {
    items: Vec<Item>,
    jobs: NonZeroUsize,
}

impl Batch {
    pub fn new(items: Vec<Item>) -> Self {
        Self {
            items,
            jobs: NonZeroUsize::MIN,
        }
    }

    /// How many videos to work on at once. Each gets its own decoder.
    pub fn jobs(mut self, jobs: NonZeroUsize) -> Self {
        self.jobs = jobs;
        self
    }

    /// Runs the whole batch. `target` is parsed first, if it is invalid then all items
    /// fail without any video being opened.
    pub fn run<E, P>(
        self,
        target: &str,
        extractor: &E,
        progress: &P,
        term_cookie: &Cookie,
    ) -> Outcome
    where
        E: Extract + Sync,
        P: Progress + Sync,
    {
        let total = self.items.len();

        let target: TargetSecond = match target.parse() {
            Ok(target) => target,
            Err(e) => {
                log::error!("Invalid target second: {e}");
                let entries = self
                    .items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| {
                        let status = Status::Failure(ExtractError::Parse(e.clone()));
                        progress.finished(i, total, &item, &status);
                        Entry { item, status }
                    })
                    .collect();
                return Outcome { entries };
            }
        };

        log::info!("Taking the frame at {} from {} videos", target, total);

        let queue = WorkQueue::new(self.items);
        if queue.is_empty() {
            return Outcome { entries: vec![] };
        }
        let statuses = Mutex::new((0..total).map(|_| Status::Pending).collect::<Vec<_>>());
        let num_workers = self.jobs.get().min(total).max(1);

        let finished = scoped_workers(|s| {
            let ctx = Ctx {
                queue: &queue,
                statuses: &statuses,
                target,
                extractor,
                progress,
                term_cookie,
            };
            for _ in 0..num_workers {
                s.spawn("X", move || work(ctx));
            }
        });

        for FinishedWorker { name, result } in finished {
            if let Err(panic) = result {
                log::error!("Thread '{name}' panicked with: {panic}");
            }
        }

        let statuses = statuses.into_inner().unwrap_or_else(PoisonError::into_inner);
        let entries = queue
            .into_inner()
            .into_iter()
            .zip(statuses)
            .map(|(item, status)| Entry { item, status })
            .collect();
        Outcome { entries }
    }
}

struct Ctx<'env, E, P> {
    queue: &'env WorkQueue<Item>,
    statuses: &'env Mutex<Vec<Status>>,
    target: TargetSecond,
    extractor: &'env E,
    progress: &'env P,
    term_cookie: &'env Cookie,
}

impl<E, P> Clone for Ctx<'_, E, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E, P> Copy for Ctx<'_, E, P> {}

impl<E, P> Ctx<'_, E, P>
where
    E: Extract,
    P: Progress,
{
    fn set_status(&self, index: usize, item: &Item, status: Status) {
        self.progress
            .finished(index, self.queue.len(), item, &status);
        self.statuses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)[index] = status;
    }
}

fn work<E, P>(ctx: Ctx<'_, E, P>)
where
    E: Extract,
    P: Progress,
{
    log::debug!("worker started");

    while let Some((i, item)) = ctx.queue.next_index() {
        if ctx.term_cookie.is_terminating() {
            log::warn!("Termination signal received, skipping the rest");
            ctx.set_status(i, item, Status::Skipped);
            for (i, item) in ctx.queue.drain_remaining() {
                ctx.set_status(i, item, Status::Skipped);
            }
            break;
        }

        ctx.progress.started(i, ctx.queue.len(), item);

        let before = Instant::now();
        let extracted = panic::catch_unwind(AssertUnwindSafe(|| {
            ctx.extractor.extract(&item.video, ctx.target, &item.name)
        }));
        let status = match extracted {
            Ok(Ok(snapshot)) => Status::Success(snapshot),
            Ok(Err(e)) => Status::Failure(e),
            Err(panic) => Status::Failure(ExtractError::Panic {
                video: item.video.clone(),
                message: CaughtPanic(panic).to_string(),
            }),
        };
        log::debug!(
            "It took {} to process '{}'",
            humantime::Duration::from(before.elapsed()),
            item.video.display()
        );

        ctx.set_status(i, item, status);
    }

    log::debug!("worker ended");
}

#[cfg(test)]
mod test {
    use std::{collections::HashSet, time::Duration};

    use super::*;
    use crate::{frame_extractor::FrameError, frame_extractor::Timestamp, snapshot::ErrorKind};

    /// Pretends to extract frames, fails on videos with "corrupt" in their names and
    /// panics on those with "panic" in them
    #[derive(Default)]
    struct Fake {
        seen: Mutex<Vec<PathBuf>>,
        terminate_after: Option<(usize, Cookie)>,
    }

    impl Extract for Fake {
        fn extract(
            &self,
            video: &Path,
            target: TargetSecond,
            name: &str,
        ) -> Result<Snapshot, ExtractError> {
            let mut seen = self.seen.lock().unwrap();
            seen.push(video.to_path_buf());
            if let Some((after, cookie)) = &self.terminate_after {
                if seen.len() == *after {
                    cookie.terminate();
                }
            }

            drop(seen);

            if video.to_string_lossy().contains("panic") {
                panic!("decoder blew up");
            }
            if video.to_string_lossy().contains("corrupt") {
                return Err(ExtractError::Open {
                    video: video.to_path_buf(),
                    source: FrameError::NoVideoStream,
                });
            }
            Ok(Snapshot {
                output: naming::output_path("out", name),
                timestamp: Timestamp::from_duration(target.to_duration()),
            })
        }
    }

    fn items(names: &[&str]) -> Vec<Item> {
        names.iter().map(|n| Item::new(format!("/videos/{n}"))).collect()
    }

    fn statuses(outcome: &Outcome) -> Vec<&'static str> {
        outcome
            .entries
            .iter()
            .map(|e| match e.status {
                Status::Pending => "pending",
                Status::Success(_) => "ok",
                Status::Failure(_) => "err",
                Status::Skipped => "skip",
            })
            .collect()
    }

    #[test]
    fn one_corrupt_video_does_not_stop_the_rest() {
        for corrupt_at in 0..4 {
            let mut names = vec!["a.mp4", "b.mp4", "c.mp4"];
            names.insert(corrupt_at, "corrupt.mp4");
            let fake = Fake::default();

            let outcome =
                Batch::new(items(&names)).run("1.5", &fake, &LogProgress, &Cookie::manual());

            assert_eq!(3, outcome.succeeded());
            assert_eq!(1, outcome.failed());
            assert_eq!(4, fake.seen.lock().unwrap().len());
            assert_eq!("err", statuses(&outcome)[corrupt_at]);
            assert!(!outcome.all_succeeded());

            let (item, err) = outcome.failures().next().expect("one failure");
            assert_eq!("corrupt.mp4", item.name);
            assert_eq!(ErrorKind::Open, err.kind());
        }
    }

    #[test]
    fn a_panicking_video_does_not_stop_the_rest() {
        let fake = Fake::default();
        let outcome = Batch::new(items(&["a.mp4", "panic.mp4", "c.mp4", "d.mp4"])).run(
            "0",
            &fake,
            &LogProgress,
            &Cookie::manual(),
        );

        assert_eq!(vec!["ok", "err", "ok", "ok"], statuses(&outcome));
        assert_eq!(4, fake.seen.lock().unwrap().len());
        assert_eq!(0, outcome.pending());

        let (item, err) = outcome.failures().next().expect("one failure");
        assert_eq!("panic.mp4", item.name);
        assert_eq!(ErrorKind::Panic, err.kind());
        assert!(err.to_string().contains("decoder blew up"), "{err}");
    }

    #[test]
    fn sequential_keeps_the_order() {
        let fake = Fake::default();
        let outcome = Batch::new(items(&["x y.mp4", "b.mkv"])).run(
            "2",
            &fake,
            &LogProgress,
            &Cookie::manual(),
        );

        assert!(outcome.all_succeeded());
        assert_eq!(
            vec![PathBuf::from("/videos/x y.mp4"), PathBuf::from("/videos/b.mkv")],
            *fake.seen.lock().unwrap()
        );
        let Status::Success(snapshot) = &outcome.entries[0].status else {
            panic!("should have succeeded");
        };
        assert_eq!(Path::new("out/frame_x_y.mp4.jpg"), snapshot.output);
        assert_eq!(Duration::from_secs(2), snapshot.timestamp.to_duration());
    }

    #[test]
    fn parallel_processes_everything_once() {
        let names: Vec<String> = (0..20).map(|i| format!("v{i}.mp4")).collect();
        let names: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
        let fake = Fake::default();

        let outcome = Batch::new(items(&names))
            .jobs(NonZeroUsize::new(4).unwrap())
            .run("0", &fake, &LogProgress, &Cookie::manual());

        assert_eq!(20, outcome.succeeded());
        let seen: HashSet<PathBuf> = fake.seen.lock().unwrap().iter().cloned().collect();
        assert_eq!(20, seen.len());
        for (entry, name) in outcome.entries.iter().zip(&names) {
            assert_eq!(*name, entry.item.name);
        }
    }

    #[test]
    fn invalid_target_fails_everything_without_opening() {
        let fake = Fake::default();
        let outcome = Batch::new(items(&["a.mp4", "b.mp4"])).run(
            "soon",
            &fake,
            &LogProgress,
            &Cookie::manual(),
        );

        assert_eq!(2, outcome.failed());
        assert!(fake.seen.lock().unwrap().is_empty());
        assert!(outcome
            .failures()
            .all(|(_, err)| err.kind() == ErrorKind::Parse));
    }

    #[test]
    fn termination_skips_the_rest() {
        let cookie = Cookie::manual();
        let fake = Fake {
            terminate_after: Some((2, cookie.clone())),
            ..Default::default()
        };
        let outcome = Batch::new(items(&["a.mp4", "b.mp4", "c.mp4", "d.mp4"])).run(
            "0",
            &fake,
            &LogProgress,
            &cookie,
        );

        assert_eq!(vec!["ok", "ok", "skip", "skip"], statuses(&outcome));
        assert_eq!(2, outcome.skipped());
        assert_eq!(0, outcome.pending());
    }

    #[test]
    fn empty_batch() {
        let outcome =
            Batch::new(vec![]).run("0", &Fake::default(), &LogProgress, &Cookie::manual());
        assert!(outcome.entries.is_empty());
        assert!(outcome.all_succeeded());
    }

    #[test]
    fn chains_all_sources() {
        let err = ExtractError::Open {
            video: "a.mp4".into(),
            source: FrameError::NoVideoStream,
        };
        assert_eq!(
            "could not open 'a.mp4' as a video: no video stream",
            error_chain(&err)
        );
    }
}
