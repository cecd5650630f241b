//! CodeScope Core - Foundation crate for the code intelligence pipeline
//!
//! # Modules
//!
//! - [`config`] - Strongly-typed configuration with TOML and environment variable support
//! - [`domain`] - Codebases, repositories, analyses, findings and their state machines
//! - [`infrastructure`] - In-memory and PostgreSQL record stores
//! - [`logging`] - Structured logging with tracing
//!
//! Environment variables use the `CODESCOPE__` prefix with double underscore separators:
//!
//! ```bash
//! CODESCOPE__REVIEWER__MODEL=gpt-4o-mini
//! CODESCOPE__ANALYSIS__BATCH_SIZE=10
//! ```

pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod logging;

pub use config::Config;
pub use logging::init_tracing;
