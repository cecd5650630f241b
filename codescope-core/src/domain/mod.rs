//! Domain Layer - Core business logic and entities

pub mod analysis;

pub use analysis::*;
