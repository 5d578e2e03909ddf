pub mod batch;
pub mod frame_extractor;
pub mod naming;
pub mod report;
pub mod snapshot;
pub mod target;
