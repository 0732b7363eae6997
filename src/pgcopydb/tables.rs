//! Short pgcopydb invocations answered inline rather than as background jobs.

use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, error};

use super::command::CommandBuilder;
use super::requests::{ConnectionRequest, FilterTablesRequest};
use crate::error::CommandError;
use crate::jobs::runner::redact_credentials;

/// Output of a finished shell command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub code: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Run `cmd` through `sh -c` and wait for it.
pub async fn run_command(cmd: &str) -> Result<CommandOutput, std::io::Error> {
    let output = Command::new("sh")
        .args(["-c", cmd])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        code: output.status.code(),
    })
}

/// Non-empty, trimmed lines of tool output.
fn table_lines(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

/// Inline pgcopydb queries: version probe and table listing.
#[derive(Debug, Clone, Default)]
pub struct TableQueries {
    builder: CommandBuilder,
}

impl TableQueries {
    pub fn new(builder: CommandBuilder) -> Self {
        Self { builder }
    }

    /// Installed pgcopydb version, or `Unavailable`.
    pub async fn version(&self) -> Result<String, CommandError> {
        let output = run_command(&self.builder.version())
            .await
            .map_err(|e| CommandError::Unavailable(e.to_string()))?;
        if !output.success() {
            error!(stderr = %output.stderr.trim_end(), "pgcopydb version check failed");
            return Err(CommandError::Unavailable(format!(
                "{} --version exited with {:?}",
                self.builder.bin(),
                output.code
            )));
        }
        Ok(output.stdout.trim().to_string())
    }

    /// All tables visible through `req.connection_string`.
    pub async fn list(&self, req: &ConnectionRequest) -> Result<Vec<String>, CommandError> {
        req.validate()?;
        self.run_listing(&self.builder.list_tables(&req.connection_string))
            .await
    }

    /// Tables matching the `LIKE` pattern in `req.filter`.
    pub async fn filter(&self, req: &FilterTablesRequest) -> Result<Vec<String>, CommandError> {
        let cmd = self.builder.filter_tables(req)?;
        self.run_listing(&cmd).await
    }

    async fn run_listing(&self, cmd: &str) -> Result<Vec<String>, CommandError> {
        debug!(command = %redact_credentials(cmd), "Listing tables");
        let output = run_command(cmd)
            .await
            .map_err(|e| CommandError::ToolFailed(e.to_string()))?;
        if !output.success() {
            error!(stderr = %output.stderr.trim_end(), "Error listing tables");
            return Err(CommandError::ToolFailed(output.stderr));
        }
        Ok(table_lines(&output.stdout))
    }
}
