// ABOUTME: Library root for cloudrun-deploy - exposes the pipeline and backends.
// ABOUTME: The main binary is in main.rs.

pub mod backend;
pub mod clock;
pub mod config;
pub mod deploy;
pub mod diagnostics;
pub mod error;
pub mod gcp;
pub mod naming;
pub mod output;
pub mod progress;
pub mod types;
