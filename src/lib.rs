//! pgcopydb API: background execution of pgcopydb operations over HTTP.

pub mod api;
pub mod config;
pub mod error;
pub mod jobs;
pub mod pgcopydb;
