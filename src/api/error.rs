//! API errors and their HTTP rendering.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{CommandError, JobError, LogError};

/// Structured JSON error body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

/// Errors returned by handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Job with ID {0} not found")]
    JobNotFound(String),

    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Log error: {0}")]
    Log(#[from] LogError),

    #[error("Health check error: {0}")]
    Unavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::JobNotFound(id) => (
                StatusCode::NOT_FOUND,
                ErrorResponse::with_details("Job not found", format!("Job with ID {id} not found")),
            ),
            ApiError::Command(err) => match err {
                CommandError::InvalidConnectionString { .. }
                | CommandError::InvalidOption(_)
                | CommandError::InvalidArgument { .. } => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    ErrorResponse::with_details("Invalid request", err.to_string()),
                ),
                CommandError::ToolFailed(stderr) => {
                    tracing::error!(stderr = %stderr.trim_end(), "pgcopydb call failed");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ErrorResponse::with_details("pgcopydb failed", stderr.clone()),
                    )
                }
                CommandError::Unavailable(reason) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorResponse::with_details("pgcopydb not available", reason.clone()),
                ),
            },
            ApiError::Job(err) => {
                tracing::error!(error = %err, "Job submission failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::with_details("Job submission failed", err.to_string()),
                )
            }
            ApiError::Log(err) => {
                tracing::error!(error = %err, "Log read failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::with_details("Log read failed", err.to_string()),
                )
            }
            ApiError::Unavailable(reason) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorResponse::with_details("Service unavailable", reason.clone()),
            ),
        };

        (status, Json(body)).into_response()
    }
}
