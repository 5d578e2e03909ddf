use std::path::PathBuf;

use crate::{
    batch::{error_chain, Outcome, Status},
    snapshot::ErrorKind,
};

/// What happened to every video in a batch, for saving to disk
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Report {
    pub target: String,
    pub out_dir: PathBuf,
    pub entries: Vec<ReportEntry>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ReportEntry {
    pub video: PathBuf,
    pub name: String,
    pub status: ReportStatus,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ReportStatus {
    Success { output: PathBuf, frame_at: String },
    Failure { kind: ErrorKind, message: String },
    Skipped,
    Pending,
}

impl Report {
    pub fn new(
        target: impl Into<String>,
        out_dir: impl Into<PathBuf>,
        outcome: &Outcome,
    ) -> Self {
        let entries = outcome
            .entries
            .iter()
            .map(|entry| ReportEntry {
                video: entry.item.video.clone(),
                name: entry.item.name.clone(),
                status: match &entry.status {
                    Status::Success(snapshot) => ReportStatus::Success {
                        output: snapshot.output.clone(),
                        frame_at: snapshot.timestamp.to_string(),
                    },
                    Status::Failure(e) => ReportStatus::Failure {
                        kind: e.kind(),
                        message: error_chain(e),
                    },
                    Status::Skipped => ReportStatus::Skipped,
                    Status::Pending => ReportStatus::Pending,
                },
            })
            .collect();

        Self {
            target: target.into(),
            out_dir: out_dir.into(),
            entries,
        }
    }
}

pub fn save_to(writer: impl std::io::Write, report: &Report) -> ron::Result<()> {
    let conf = ron::ser::PrettyConfig::new().struct_names(true);
    ron::ser::to_writer_pretty(writer, report, conf)
}

pub fn read_from(reader: impl std::io::Read) -> ron::error::SpannedResult<Report> {
    ron::de::from_reader(reader)
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;
    use crate::{
        batch::{Entry, Item},
        frame_extractor::{FrameError, Timestamp},
        snapshot::{ExtractError, Snapshot},
    };

    fn outcome() -> Outcome {
        Outcome {
            entries: vec![
                Entry {
                    item: Item::new("/v/good one.mp4"),
                    status: Status::Success(Snapshot {
                        output: "/pics/frame_good_one.mp4.jpg".into(),
                        timestamp: Timestamp::from_duration(Duration::from_millis(1500)),
                    }),
                },
                Entry {
                    item: Item::new("/v/bad.mp4"),
                    status: Status::Failure(ExtractError::Open {
                        video: "/v/bad.mp4".into(),
                        source: FrameError::NoVideoStream,
                    }),
                },
                Entry {
                    item: Item::new("/v/late.mp4"),
                    status: Status::Skipped,
                },
            ],
        }
    }

    #[test]
    fn describes_every_entry() {
        let report = Report::new("1.5", "/pics", &outcome());
        assert_eq!(3, report.entries.len());
        assert_eq!(
            ReportStatus::Success {
                output: "/pics/frame_good_one.mp4.jpg".into(),
                frame_at: "00:00:01.500".into(),
            },
            report.entries[0].status
        );
        assert_eq!(
            ReportStatus::Failure {
                kind: ErrorKind::Open,
                message: "could not open '/v/bad.mp4' as a video: no video stream".into(),
            },
            report.entries[1].status
        );
        assert_eq!(ReportStatus::Skipped, report.entries[2].status);
    }

    #[test]
    fn saved_report_can_be_read_back() {
        let report = Report::new("1.5", "/pics", &outcome());
        let mut buf = Vec::new();
        save_to(&mut buf, &report).expect("serializable");

        let text = String::from_utf8(buf.clone()).expect("ron is utf8");
        assert!(text.contains("Failure"), "{text}");

        assert_eq!(report, read_from(buf.as_slice()).expect("deserializable"));
    }
}
