//! Error types for the pgcopydb API service.

use std::path::PathBuf;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Job lifecycle errors.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Job {id} already exists")]
    Duplicate { id: String },

    #[error("Job {id} not found")]
    Unknown { id: String },

    #[error("Job {id} already finished with status {status}")]
    AlreadyFinished { id: String, status: String },

    #[error("Command exited with code {code:?}: {stderr}")]
    CommandExecution {
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("Failed to run command: {reason}")]
    ProcessLaunch { reason: String },
}

/// Log directory / log file errors. Never fatal to a job.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("No usable log directory (tried {tried:?}): {source}")]
    NoDirectory {
        tried: Vec<PathBuf>,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from building or running pgcopydb commands.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("{field} must start with postgresql://")]
    InvalidConnectionString { field: String },

    #[error("Invalid option {0:?}: options must look like --flag or --flag=value")]
    InvalidOption(String),

    #[error("Invalid {field}: {reason}")]
    InvalidArgument { field: String, reason: String },

    #[error("pgcopydb failed: {0}")]
    ToolFailed(String),

    #[error("pgcopydb not available: {0}")]
    Unavailable(String),
}
