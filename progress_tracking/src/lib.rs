mod publisher;

pub use publisher::{FetchDetails, ProgressPhase, ProgressPublisher, ProgressSnapshot};
