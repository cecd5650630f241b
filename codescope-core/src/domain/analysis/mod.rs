//! Analysis domain module
//!
//! Codebases, repositories, analysis runs and findings, together with the
//! status state machines and the store traits the orchestrator drives.

pub mod entities;
pub mod errors;
pub mod repositories;
pub mod source;
pub mod summary;
pub mod value_objects;

pub use entities::*;
pub use errors::*;
pub use repositories::*;
pub use source::*;
pub use summary::*;
pub use value_objects::*;
