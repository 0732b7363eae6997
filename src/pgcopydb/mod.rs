//! pgcopydb integration: request models, command construction, inline queries.

pub mod command;
pub mod requests;
pub mod tables;

pub use command::{CommandBuilder, shell_quote};
pub use requests::{
    CloneRequest, ConnectionRequest, CopyRequest, DumpRequest, DumpType, FilterTablesRequest,
    RestoreRequest,
};
pub use tables::TableQueries;
