//! Job state machine and job record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// The command has been dispatched and has not exited yet.
    Running,
    /// The command exited with code 0.
    Completed,
    /// The command exited nonzero or could not be run.
    Error,
}

impl JobStatus {
    /// Check if this status allows transitioning to another status.
    pub fn can_transition_to(&self, target: JobStatus) -> bool {
        use JobStatus::*;

        matches!((self, target), (Running, Completed) | (Running, Error))
    }

    /// Check if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// Label written to the execution ledger.
    pub fn ledger_label(&self) -> &'static str {
        match self {
            Self::Running => "Running",
            Self::Completed => "Completed",
            Self::Error => "Error",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// Outcome applied to a running job exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub status: JobStatus,
    pub output: String,
    pub error_detail: Option<String>,
    pub exit_code: Option<i32>,
    pub log_file_path: Option<String>,
}

impl Completion {
    /// Command exited with code 0.
    pub fn succeeded(output: String, log_file_path: Option<String>) -> Self {
        Self {
            status: JobStatus::Completed,
            output,
            error_detail: None,
            exit_code: Some(0),
            log_file_path,
        }
    }

    /// Command ran but exited nonzero (or was killed by a signal).
    pub fn failed(
        output: String,
        stderr: String,
        exit_code: Option<i32>,
        log_file_path: Option<String>,
    ) -> Self {
        Self {
            status: JobStatus::Error,
            output,
            error_detail: Some(stderr),
            exit_code,
            log_file_path,
        }
    }

    /// Command could not be launched or its output could not be collected.
    pub fn crashed(reason: impl Into<String>, log_file_path: Option<String>) -> Self {
        Self {
            status: JobStatus::Error,
            output: String::new(),
            error_detail: Some(reason.into()),
            exit_code: None,
            log_file_path,
        }
    }
}

/// A job as seen by status queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    #[serde(rename = "job_id")]
    pub id: String,
    /// Exact command string, recorded verbatim.
    pub command: String,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(rename = "error", default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    pub finished: bool,
    #[serde(rename = "log_file", default, skip_serializing_if = "Option::is_none")]
    pub log_file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    /// A freshly submitted job.
    pub fn running(id: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            command: command.into(),
            status: JobStatus::Running,
            output: None,
            error_detail: None,
            finished: false,
            log_file_path: None,
            exit_code: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Apply a terminal outcome.
    pub fn finish(&mut self, completion: Completion) -> Result<(), String> {
        if !self.status.can_transition_to(completion.status) {
            return Err(format!(
                "Cannot transition from {} to {}",
                self.status, completion.status
            ));
        }

        self.status = completion.status;
        self.output = Some(completion.output);
        self.error_detail = match completion.status {
            JobStatus::Error => Some(completion.error_detail.unwrap_or_default()),
            _ => None,
        };
        self.exit_code = completion.exit_code;
        self.log_file_path = completion.log_file_path;
        self.finished = true;
        self.finished_at = Some(Utc::now());
        Ok(())
    }
}
