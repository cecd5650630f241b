//! Record store implementations

pub mod memory;
pub mod postgres;

pub use memory::{
    InMemoryAnalysisStore, InMemoryCodebaseStore, InMemoryFindingStore, InMemoryRepositoryStore,
};
pub use postgres::{
    PostgresAnalysisStore, PostgresCodebaseStore, PostgresFindingStore, PostgresRepositoryStore,
};
