pub mod acquirer;

pub use acquirer::{GitAcquirerConfig, GitRepositoryAcquirer};
