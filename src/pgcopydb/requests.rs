//! Request bodies accepted by the HTTP API.

use serde::{Deserialize, Serialize};

use crate::error::CommandError;

const CONNECTION_PREFIX: &str = "postgresql://";

fn check_connection(field: &str, value: &str) -> Result<(), CommandError> {
    if value.starts_with(CONNECTION_PREFIX) {
        Ok(())
    } else {
        Err(CommandError::InvalidConnectionString {
            field: field.to_string(),
        })
    }
}

fn check_not_blank(field: &str, value: &str) -> Result<(), CommandError> {
    if value.trim().is_empty() {
        Err(CommandError::InvalidArgument {
            field: field.to_string(),
            reason: "must not be empty".to_string(),
        })
    } else {
        Ok(())
    }
}

/// What a dump request produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DumpType {
    /// Schema followed by roles, chained with `&&`.
    #[default]
    Full,
    Schema,
    Roles,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CloneRequest {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub options: Vec<String>,
}

impl CloneRequest {
    pub fn validate(&self) -> Result<(), CommandError> {
        check_connection("source", &self.source)?;
        check_connection("target", &self.target)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DumpRequest {
    pub source: String,
    pub dir: String,
    #[serde(default)]
    pub tables: Option<Vec<String>>,
    #[serde(default)]
    pub exclude_tables: Option<Vec<String>>,
    #[serde(default)]
    pub dump_type: DumpType,
    #[serde(default)]
    pub no_role_passwords: bool,
    #[serde(default)]
    pub snapshot: Option<String>,
    #[serde(default)]
    pub skip_extensions: bool,
    #[serde(default)]
    pub filters_file: Option<String>,
}

impl DumpRequest {
    pub fn validate(&self) -> Result<(), CommandError> {
        check_connection("source", &self.source)?;
        check_not_blank("dir", &self.dir)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RestoreRequest {
    pub target: String,
    pub dir: String,
    #[serde(default)]
    pub tables: Option<Vec<String>>,
    #[serde(default)]
    pub exclude_tables: Option<Vec<String>>,
    #[serde(default)]
    pub schema_only: bool,
    #[serde(default)]
    pub data_only: bool,
}

impl RestoreRequest {
    pub fn validate(&self) -> Result<(), CommandError> {
        check_connection("target", &self.target)?;
        check_not_blank("dir", &self.dir)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CopyRequest {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub tables: Option<Vec<String>>,
    #[serde(default)]
    pub exclude_tables: Option<Vec<String>>,
}

impl CopyRequest {
    pub fn validate(&self) -> Result<(), CommandError> {
        check_connection("source", &self.source)?;
        check_connection("target", &self.target)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionRequest {
    pub connection_string: String,
}

impl ConnectionRequest {
    pub fn validate(&self) -> Result<(), CommandError> {
        check_connection("connection_string", &self.connection_string)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilterTablesRequest {
    pub connection_string: String,
    /// `LIKE` pattern passed to `pgcopydb list tables --like`.
    pub filter: String,
}

impl FilterTablesRequest {
    pub fn validate(&self) -> Result<(), CommandError> {
        check_connection("connection_string", &self.connection_string)?;
        check_not_blank("filter", &self.filter)
    }
}
