//! Per-directory progress records.
//!
//! Every directory visited keeps two append-only text files next to the media
//! it describes: paths confirmed uploaded, and paths skipped for exceeding
//! the size limit. Together they make re-runs resumable and idempotent:
//! - Discovery never re-queues a path found in either record
//! - Workers append exactly one line per terminal success or size skip
//! - Deleting the files resets that directory

pub mod error;
pub mod log;

pub use log::{DirectorySummary, ProgressLog, TextProgressLog};
