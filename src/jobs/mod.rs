//! Background job execution and status tracking.
//!
//! Core components:
//! - `state`: Job status machine (Running → Completed/Error) and job record
//! - `registry`: In-memory job table, the source of truth for status queries
//! - `log_store`: Per-job log files and the shared execution ledger
//! - `runner`: Launches commands in the background and settles their records

pub mod log_store;
pub mod registry;
pub mod runner;
pub mod state;

pub use log_store::{LedgerEntry, LogStore};
pub use registry::JobRegistry;
pub use runner::{JobLogView, JobRunner};
pub use state::{Completion, JobRecord, JobStatus};
