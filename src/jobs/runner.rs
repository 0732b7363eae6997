//! Job runner: executes one shell command per job in the background.
//!
//! `start()` registers the job, writes the starting line to its log and hands
//! the command to a spawned task, then returns without waiting. The task
//! streams stdout and stderr into the job log and the ledger while capturing
//! both, and settles the registry entry exactly once when the child exits.
//!
//! There is no bound on concurrently running jobs, no timeout and no
//! cancellation. Child processes outlive the registry if the service restarts.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::log_store::{JobLog, LedgerEntry, LogStore, OutputSink};
use super::registry::JobRegistry;
use super::state::{Completion, JobRecord};
use crate::error::{JobError, LogError};

/// Returned for log queries on a job that was never registered.
pub const JOB_NOT_FOUND: &str = "Job not found";

/// Returned for log queries on a job without a readable log file.
pub const NO_JOB_LOGS: &str = "No logs found for this job";

/// Returned when the ledger has never been written.
pub const NO_EXECUTION_LOGS: &str = "No execution logs found";

/// Buffered output chunks between the pipe readers and the log writer.
const OUTPUT_CHANNEL_CAPACITY: usize = 256;

/// Credentials embedded in connection URIs.
static URI_PASSWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(postgres(?:ql)?://[^:/@\s]+):[^@\s]+@").expect("valid regex")
});

/// Mask passwords in connection URIs before a command reaches diagnostics.
///
/// Registry records and the ledger keep the verbatim command.
pub fn redact_credentials(command: &str) -> Cow<'_, str> {
    URI_PASSWORD.replace_all(command, "$1:****@")
}

/// Result of reading a job log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobLogView {
    Found(String),
    NoLogs,
    NotFound,
    Unreadable(String),
}

impl JobLogView {
    /// Log text, or the sentinel message for the missing cases.
    pub fn into_text(self) -> String {
        match self {
            Self::Found(text) => text,
            Self::NoLogs => NO_JOB_LOGS.to_string(),
            Self::NotFound => JOB_NOT_FOUND.to_string(),
            Self::Unreadable(reason) => format!("Error reading log file: {reason}"),
        }
    }
}

/// Which pipe a chunk of output came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

#[derive(Debug)]
struct OutputChunk {
    stream: Stream,
    bytes: Vec<u8>,
}

/// Output captured from a finished child.
#[derive(Debug, Default)]
struct CapturedOutput {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl CapturedOutput {
    fn push(&mut self, chunk: OutputChunk) {
        match chunk.stream {
            Stream::Stdout => self.stdout.extend_from_slice(&chunk.bytes),
            Stream::Stderr => self.stderr.extend_from_slice(&chunk.bytes),
        }
    }

    fn into_strings(self) -> (String, String) {
        (
            String::from_utf8_lossy(&self.stdout).into_owned(),
            String::from_utf8_lossy(&self.stderr).into_owned(),
        )
    }
}

/// Best-effort writer fanning combined output out to the job log and the ledger.
///
/// A destination that fails once is dropped for the rest of the job.
struct Tee<'a> {
    job_id: &'a str,
    job_log: Option<&'a mut JobLog>,
    ledger: Option<OutputSink>,
}

impl Tee<'_> {
    async fn write(&mut self, bytes: &[u8]) {
        if let Some(log) = self.job_log.as_deref_mut() {
            if let Err(e) = log.write_output(bytes).await {
                warn!(job_id = self.job_id, error = %e, "Job log write failed, no further output will be logged there");
                self.job_log = None;
            }
        }
        if let Some(sink) = self.ledger.as_mut() {
            if let Err(e) = sink.write_output(bytes).await {
                warn!(job_id = self.job_id, error = %e, "Ledger output write failed, no further output will be logged there");
                self.ledger = None;
            }
        }
    }
}

/// Runs submitted commands and drives the registry and log store.
#[derive(Debug)]
pub struct JobRunner {
    registry: Arc<JobRegistry>,
    log_store: LogStore,
    shell: PathBuf,
}

impl JobRunner {
    /// Create a runner using `sh -c` to execute commands.
    pub fn new(registry: Arc<JobRegistry>, log_store: LogStore) -> Self {
        let shell = if cfg!(target_os = "windows") {
            "cmd"
        } else {
            "sh"
        };
        Self {
            registry,
            log_store,
            shell: PathBuf::from(shell),
        }
    }

    /// Set the shell used to interpret commands.
    pub fn with_shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn log_store(&self) -> &LogStore {
        &self.log_store
    }

    /// Register a new job for `command` and dispatch it. Returns the `running` record.
    pub async fn start(self: &Arc<Self>, command: impl Into<String>) -> Result<JobRecord, JobError> {
        let command = command.into();
        let job_id = Uuid::new_v4().to_string();

        let record = self.registry.create(job_id.clone(), command.clone()).await?;

        // The handle is only useful to callers that want to wait; the API never does.
        let _handle = self.submit(job_id, command).await;

        Ok(record)
    }

    /// Open the job log, then execute `command` on a background task.
    ///
    /// The returned handle resolves once the registry entry for `job_id` is
    /// terminal and the ledger entry has been appended (or failed to append).
    pub async fn submit(self: &Arc<Self>, job_id: String, command: String) -> JoinHandle<()> {
        info!(job_id = %job_id, command = %redact_credentials(&command), "Starting command");

        let job_log = match self.log_store.open_job_log(&job_id, &command).await {
            Ok(log) => Some(log),
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "Could not open job log, continuing without it");
                None
            }
        };

        let runner = Arc::clone(self);
        let task_job_id = job_id.clone();
        let task_command = command.clone();
        let task = tokio::spawn(async move {
            runner.run(&task_job_id, &task_command, job_log).await;
        });

        // Watch the execution task so a panic still settles the record.
        let runner = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = task.await {
                error!(job_id = %job_id, error = %e, "Job task aborted");
                let completion = Completion::crashed(format!("Job task aborted: {e}"), None);
                runner.finish(&job_id, &command, completion).await;
            }
        })
    }

    /// Current record for `job_id`.
    pub async fn status(&self, job_id: &str) -> Option<JobRecord> {
        self.registry.get(job_id).await
    }

    /// Contents of the job's log file.
    pub async fn job_log(&self, job_id: &str) -> JobLogView {
        let Some(record) = self.registry.get(job_id).await else {
            return JobLogView::NotFound;
        };

        let path = match record.log_file_path {
            Some(path) => PathBuf::from(path),
            None if !record.finished => self.log_store.job_log_path(job_id),
            None => return JobLogView::NoLogs,
        };

        match self.log_store.read_job_log(&path).await {
            Ok(Some(text)) => JobLogView::Found(text),
            Ok(None) => JobLogView::NoLogs,
            Err(e) => {
                error!(job_id, error = %e, "Error reading job log");
                JobLogView::Unreadable(e.to_string())
            }
        }
    }

    /// Full text of the execution ledger, `None` if it was never written.
    pub async fn execution_ledger(&self) -> Result<Option<String>, LogError> {
        self.log_store.read_ledger().await
    }

    async fn run(&self, job_id: &str, command: &str, mut job_log: Option<JobLog>) {
        let log_file_path = job_log.as_ref().map(|log| path_string(log.path()));

        let result = self.execute(job_id, command, job_log.as_mut()).await;

        let completion = match result {
            Ok((stdout, _stderr)) => {
                info!(job_id, "Command completed successfully");
                log_lines(
                    job_log.as_mut(),
                    job_id,
                    &[
                        "Command completed with code: 0".to_string(),
                        "Command completed successfully".to_string(),
                    ],
                )
                .await;
                Completion::succeeded(stdout, log_file_path)
            }
            Err(JobError::CommandExecution {
                code,
                stdout,
                stderr,
            }) => {
                let code_text = code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "none (terminated by signal)".to_string());
                error!(job_id, exit_code = ?code, stderr = %stderr.trim_end(), "Error in command");
                log_lines(
                    job_log.as_mut(),
                    job_id,
                    &[
                        format!("Command completed with code: {code_text}"),
                        format!("Error in command: {stderr}"),
                    ],
                )
                .await;
                Completion::failed(stdout, stderr, code, log_file_path)
            }
            Err(e) => {
                error!(job_id, command = %redact_credentials(command), error = %e, "Exception executing command");
                log_lines(job_log.as_mut(), job_id, &[format!("Error in command: {e}")]).await;
                Completion::crashed(e.to_string(), log_file_path)
            }
        };

        self.finish(job_id, command, completion).await;
    }

    /// Spawn the child and tee its output until it exits.
    ///
    /// Returns captured (stdout, stderr) on exit code 0.
    async fn execute(
        &self,
        job_id: &str,
        command: &str,
        job_log: Option<&mut JobLog>,
    ) -> Result<(String, String), JobError> {
        let mut cmd = Command::new(&self.shell);
        if cfg!(target_os = "windows") {
            cmd.args(["/C", command]);
        } else {
            cmd.args(["-c", command]);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(false);

        let mut child = cmd.spawn().map_err(|e| JobError::ProcessLaunch {
            reason: format!("Failed to spawn command: {e}"),
        })?;
        debug!(job_id, pid = ?child.id(), "Child process spawned");

        let stdout = child.stdout.take().ok_or_else(|| JobError::ProcessLaunch {
            reason: "stdout was not captured".to_string(),
        })?;
        let stderr = child.stderr.take().ok_or_else(|| JobError::ProcessLaunch {
            reason: "stderr was not captured".to_string(),
        })?;

        let (tx, mut rx) = mpsc::channel(OUTPUT_CHANNEL_CAPACITY);
        let stdout_pump = tokio::spawn(pump(stdout, Stream::Stdout, tx.clone()));
        let stderr_pump = tokio::spawn(pump(stderr, Stream::Stderr, tx));

        let ledger = match self.log_store.open_output_sink().await {
            Ok(sink) => Some(sink),
            Err(e) => {
                warn!(job_id, error = %e, "Could not open ledger for raw output");
                None
            }
        };
        let mut tee = Tee {
            job_id,
            job_log,
            ledger,
        };

        let mut captured = CapturedOutput::default();
        while let Some(chunk) = rx.recv().await {
            tee.write(&chunk.bytes).await;
            captured.push(chunk);
        }

        for reader in [stdout_pump, stderr_pump] {
            reader
                .await
                .map_err(|e| JobError::ProcessLaunch {
                    reason: format!("Output reader failed: {e}"),
                })?
                .map_err(|e| JobError::ProcessLaunch {
                    reason: format!("Failed to read command output: {e}"),
                })?;
        }

        let status = child.wait().await.map_err(|e| JobError::ProcessLaunch {
            reason: format!("Failed to wait for command: {e}"),
        })?;

        let (stdout, stderr) = captured.into_strings();
        if status.success() {
            Ok((stdout, stderr))
        } else {
            Err(JobError::CommandExecution {
                code: status.code(),
                stdout,
                stderr,
            })
        }
    }

    /// Settle the registry entry and append the ledger block.
    async fn finish(&self, job_id: &str, command: &str, completion: Completion) {
        let status = completion.status;
        let log_file = completion.log_file_path.clone();

        match self.registry.complete(job_id, completion).await {
            Ok(record) => {
                debug!(job_id, status = %record.status, "Job finished");
            }
            Err(e @ JobError::AlreadyFinished { .. }) => {
                // The ledger already holds this job's block.
                error!(job_id, error = %e, "Registry rejected job completion");
                return;
            }
            Err(e) => {
                error!(job_id, error = %e, "Registry rejected job completion");
            }
        }

        let entry = LedgerEntry {
            job_id,
            command,
            status,
            log_file: log_file.as_deref().map(Path::new),
        };
        if let Err(e) = self.log_store.append_ledger(&entry).await {
            warn!(job_id, error = %e, "Error writing to shared log file");
        }
    }
}

/// Forward lines from one pipe into the output channel until EOF.
async fn pump<R>(reader: R, stream: Stream, tx: mpsc::Sender<OutputChunk>) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    loop {
        let mut bytes = Vec::new();
        if reader.read_until(b'\n', &mut bytes).await? == 0 {
            return Ok(());
        }
        if tx.send(OutputChunk { stream, bytes }).await.is_err() {
            return Ok(());
        }
    }
}

async fn log_lines(job_log: Option<&mut JobLog>, job_id: &str, lines: &[String]) {
    let Some(log) = job_log else {
        return;
    };
    for line in lines {
        if let Err(e) = log.write_line(line).await {
            warn!(job_id, error = %e, "Error writing to job log");
            return;
        }
    }
}

fn path_string(path: &Path) -> String {
    path.display().to_string()
}
