pub mod aggregation;
pub mod errors;
pub mod lifecycle;
pub mod orchestrator;
mod runs;

pub use aggregation::{RepositoryContribution, RunAccumulator, RunTotals};
pub use errors::OrchestratorError;
pub use lifecycle::LifecycleController;
pub use orchestrator::{AnalysisOrchestrator, OrchestratorConfig, RecordStores};
