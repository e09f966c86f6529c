#![forbid(unsafe_code)]

pub mod error;
pub mod merge;
pub mod model;
pub mod stats;
pub mod time;

pub use error::Error;
pub use merge::{MergeError, ViewRecord, merge_by_key, merge_by_recency};
pub use stats::{ProgressStats, Reconciliation, StatusCounts, reconcile};
pub use time::Clock;
