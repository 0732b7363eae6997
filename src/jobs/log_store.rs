//! File-backed log store for job output.
//!
//! The log directory holds:
//! - `job-<id>.log`: one file per job, truncated when the job starts
//! - `pgcopydb-executions.log`: shared ledger; raw output of every job plus one
//!   delimited summary block per finished job
//!
//! Ledger writers never take an in-process lock. Each write is a single
//! `write_all` on a handle opened in append mode, so blocks from concurrent jobs
//! may interleave with each other but are never torn.

use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::state::JobStatus;
use crate::error::LogError;

/// Shared ledger file name.
pub const LEDGER_FILE: &str = "pgcopydb-executions.log";

/// Width of the `=` separator lines around ledger blocks.
const SEPARATOR_WIDTH: usize = 50;

/// Current time in ISO-8601.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// One summary block appended to the ledger when a job finishes.
#[derive(Debug, Clone)]
pub struct LedgerEntry<'a> {
    pub job_id: &'a str,
    pub command: &'a str,
    pub status: JobStatus,
    pub log_file: Option<&'a Path>,
}

impl LedgerEntry<'_> {
    /// Render the block exactly as it is written to disk.
    pub fn render(&self) -> String {
        let separator = "=".repeat(SEPARATOR_WIDTH);
        let log_file = self
            .log_file
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "None".to_string());
        format!(
            "\n{separator}\nJob ID: {}\nCommand: {}\nStatus: {}\nLog file: {}\nTimestamp: {}\n{separator}\n\n",
            self.job_id,
            self.command,
            self.status.ledger_label(),
            log_file,
            timestamp(),
        )
    }
}

/// Log directory with per-job logs and the shared ledger.
#[derive(Debug, Clone)]
pub struct LogStore {
    dir: PathBuf,
}

impl LogStore {
    /// Use `dir` as the log directory, creating it if needed.
    pub async fn new(dir: impl Into<PathBuf>) -> Result<Self, LogError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .map_err(|source| LogError::NoDirectory {
                tried: vec![dir.clone()],
                source,
            })?;
        Ok(Self { dir })
    }

    /// Pick `preferred` if it already exists, otherwise create and use `fallback`.
    pub async fn resolve(preferred: &Path, fallback: &Path) -> Result<Self, LogError> {
        if fs::metadata(preferred)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            info!(dir = %preferred.display(), "Using log directory");
            return Ok(Self {
                dir: preferred.to_path_buf(),
            });
        }

        match fs::create_dir_all(fallback).await {
            Ok(()) => {
                info!(
                    dir = %fallback.display(),
                    preferred = %preferred.display(),
                    "Preferred log directory missing, using fallback"
                );
                Ok(Self {
                    dir: fallback.to_path_buf(),
                })
            }
            Err(source) => Err(LogError::NoDirectory {
                tried: vec![preferred.to_path_buf(), fallback.to_path_buf()],
                source,
            }),
        }
    }

    /// The resolved log directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the log file for `job_id`.
    pub fn job_log_path(&self, job_id: &str) -> PathBuf {
        self.dir.join(format!("job-{job_id}.log"))
    }

    /// Path of the shared ledger.
    pub fn ledger_path(&self) -> PathBuf {
        self.dir.join(LEDGER_FILE)
    }

    /// Create (or truncate) the job log and write the starting line.
    pub async fn open_job_log(&self, job_id: &str, command: &str) -> Result<JobLog, LogError> {
        let path = self.job_log_path(job_id);
        let file = File::create(&path)
            .await
            .map_err(|source| LogError::Write {
                path: path.clone(),
                source,
            })?;

        let mut log = JobLog { file, path };
        log.write_line(&format!("Starting command: {command}"))
            .await?;
        debug!(job_id, path = %log.path.display(), "Job log opened");
        Ok(log)
    }

    /// Open the ledger in append mode for streaming raw job output.
    pub async fn open_output_sink(&self) -> Result<OutputSink, LogError> {
        let path = self.ledger_path();
        let file = open_append(&path).await?;
        Ok(OutputSink { file, path })
    }

    /// Append one summary block to the ledger (open, append, close).
    pub async fn append_ledger(&self, entry: &LedgerEntry<'_>) -> Result<(), LogError> {
        let path = self.ledger_path();
        let mut file = open_append(&path).await?;
        write_all(&mut file, &path, entry.render().as_bytes()).await
    }

    /// Read a job log. `Ok(None)` if the file does not exist.
    pub async fn read_job_log(&self, path: &Path) -> Result<Option<String>, LogError> {
        read_optional(path).await
    }

    /// Read the whole ledger. `Ok(None)` if nothing was ever written.
    pub async fn read_ledger(&self) -> Result<Option<String>, LogError> {
        read_optional(&self.ledger_path()).await
    }
}

/// Write handle on one job's log file, held for the duration of the job.
#[derive(Debug)]
pub struct JobLog {
    file: File,
    path: PathBuf,
}

impl JobLog {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a `[timestamp] message` line.
    pub async fn write_line(&mut self, message: &str) -> Result<(), LogError> {
        let line = format!("[{}] {message}\n", timestamp());
        write_all(&mut self.file, &self.path, line.as_bytes()).await
    }

    /// Append raw command output as-is.
    pub async fn write_output(&mut self, chunk: &[u8]) -> Result<(), LogError> {
        write_all(&mut self.file, &self.path, chunk).await
    }
}

/// Append handle on the ledger receiving raw output from one job.
#[derive(Debug)]
pub struct OutputSink {
    file: File,
    path: PathBuf,
}

impl OutputSink {
    pub async fn write_output(&mut self, chunk: &[u8]) -> Result<(), LogError> {
        write_all(&mut self.file, &self.path, chunk).await
    }
}

async fn open_append(path: &Path) -> Result<File, LogError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|source| LogError::Write {
            path: path.to_path_buf(),
            source,
        })
}

/// Write and flush, so readers of the file see the bytes immediately.
async fn write_all(file: &mut File, path: &Path, bytes: &[u8]) -> Result<(), LogError> {
    let result = match file.write_all(bytes).await {
        Ok(()) => file.flush().await,
        Err(e) => Err(e),
    };
    result.map_err(|source| LogError::Write {
        path: path.to_path_buf(),
        source,
    })
}

async fn read_optional(path: &Path) -> Result<Option<String>, LogError> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(LogError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}
