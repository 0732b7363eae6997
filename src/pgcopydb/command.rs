//! Builds pgcopydb shell commands from typed requests.
//!
//! Every user-supplied value is single-quoted before it reaches the shell, so
//! the job runner only ever sees a finished command string it can pass to
//! `sh -c` untouched.

use std::sync::LazyLock;

use regex::Regex;

use super::requests::{
    CloneRequest, CopyRequest, DumpRequest, DumpType, FilterTablesRequest, RestoreRequest,
};
use crate::error::CommandError;

/// A short flag (`-j`) or a long flag with an optional inline value (`--jobs=4`).
static OPTION_FLAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(-[A-Za-z0-9]+|--[A-Za-z0-9][A-Za-z0-9-]*(=.+)?)$").expect("valid regex")
});

/// Quote `value` as a single shell word.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Turns API requests into pgcopydb invocations.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    bin: String,
}

impl Default for CommandBuilder {
    fn default() -> Self {
        Self::new("pgcopydb")
    }
}

impl CommandBuilder {
    /// Create a builder invoking `bin`.
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    pub fn bin(&self) -> &str {
        &self.bin
    }

    /// `pgcopydb --version`
    pub fn version(&self) -> String {
        format!("{} --version", self.bin)
    }

    /// `pgcopydb clone --source S --target T [options...]`
    pub fn clone_db(&self, req: &CloneRequest) -> Result<String, CommandError> {
        req.validate()?;

        let mut cmd = format!(
            "{} clone --source {} --target {}",
            self.bin,
            shell_quote(&req.source),
            shell_quote(&req.target)
        );
        for word in option_words(&req.options)? {
            cmd.push(' ');
            cmd.push_str(&shell_quote(word));
        }
        Ok(cmd)
    }

    /// Dump schema, roles, or both.
    ///
    /// A full dump is the schema command `&&` the roles command: if the schema
    /// dump fails the roles dump never runs and the job reports a single error.
    pub fn dump(&self, req: &DumpRequest) -> Result<String, CommandError> {
        req.validate()?;

        let cmd = match req.dump_type {
            DumpType::Schema => self.dump_schema(req),
            DumpType::Roles => self.dump_roles(req),
            DumpType::Full => format!("{} && {}", self.dump_schema(req), self.dump_roles(req)),
        };
        Ok(cmd)
    }

    fn dump_schema(&self, req: &DumpRequest) -> String {
        let mut cmd = format!(
            "{} dump schema --source {} --dir {}",
            self.bin,
            shell_quote(&req.source),
            shell_quote(&req.dir)
        );
        if req.skip_extensions {
            cmd.push_str(" --skip-extensions");
        }
        if let Some(snapshot) = &req.snapshot {
            cmd.push_str(&format!(" --snapshot {}", shell_quote(snapshot)));
        }
        if let Some(filters) = &req.filters_file {
            cmd.push_str(&format!(" --filters {}", shell_quote(filters)));
        }
        push_tables(&mut cmd, req.tables.as_deref(), req.exclude_tables.as_deref());
        cmd
    }

    fn dump_roles(&self, req: &DumpRequest) -> String {
        let mut cmd = format!(
            "{} dump roles --source {} --dir {}",
            self.bin,
            shell_quote(&req.source),
            shell_quote(&req.dir)
        );
        if req.no_role_passwords {
            cmd.push_str(" --no-role-passwords");
        }
        cmd
    }

    /// `pgcopydb restore --target T --input-dir D [...]`
    pub fn restore(&self, req: &RestoreRequest) -> Result<String, CommandError> {
        req.validate()?;

        let mut cmd = format!(
            "{} restore --target {} --input-dir {}",
            self.bin,
            shell_quote(&req.target),
            shell_quote(&req.dir)
        );
        if req.schema_only {
            cmd.push_str(" --schema-only");
        }
        if req.data_only {
            cmd.push_str(" --data-only");
        }
        push_tables(&mut cmd, req.tables.as_deref(), req.exclude_tables.as_deref());
        Ok(cmd)
    }

    /// `pgcopydb copy-db --source S --target T [...]`
    pub fn copy_db(&self, req: &CopyRequest) -> Result<String, CommandError> {
        req.validate()?;

        let mut cmd = format!(
            "{} copy-db --source {} --target {}",
            self.bin,
            shell_quote(&req.source),
            shell_quote(&req.target)
        );
        push_tables(&mut cmd, req.tables.as_deref(), req.exclude_tables.as_deref());
        Ok(cmd)
    }

    /// `pgcopydb list tables --source S`
    pub fn list_tables(&self, connection_string: &str) -> String {
        format!(
            "{} list tables --source {}",
            self.bin,
            shell_quote(connection_string)
        )
    }

    /// `pgcopydb list tables --source S --like P`
    pub fn filter_tables(&self, req: &FilterTablesRequest) -> Result<String, CommandError> {
        req.validate()?;
        Ok(format!(
            "{} --like {}",
            self.list_tables(&req.connection_string),
            shell_quote(&req.filter)
        ))
    }
}

/// Split extra options into shell words.
///
/// Entries may hold several words (`--table-jobs 4`) or a lone value following
/// the previous entry's flag. Every word must be a flag, or the single value
/// after a flag that has no inline `=value`.
fn option_words(options: &[String]) -> Result<Vec<&str>, CommandError> {
    let mut words = Vec::new();
    let mut expects_value = false;

    for word in options.iter().flat_map(|o| o.split_whitespace()) {
        if OPTION_FLAG.is_match(word) {
            expects_value = !word.contains('=');
        } else if expects_value {
            expects_value = false;
        } else {
            return Err(CommandError::InvalidOption(word.to_string()));
        }
        words.push(word);
    }
    Ok(words)
}

fn push_tables(cmd: &mut String, tables: Option<&[String]>, exclude: Option<&[String]>) {
    for table in tables.unwrap_or_default() {
        cmd.push_str(&format!(" --table {}", shell_quote(table)));
    }
    for table in exclude.unwrap_or_default() {
        cmd.push_str(&format!(" --exclude-table {}", shell_quote(table)));
    }
}
