//! CodeScope Orchestrator - drives analysis runs across a codebase's repositories
//!
//! # Architecture
//!
//! ```text
//! codescope-orchestrator/
//! ├── domain/            # Acquirer and progress contracts
//! ├── application/       # Orchestrator, lifecycle controller, aggregation
//! └── infrastructure/    # Git acquirer, scanner, progress sinks, dispatcher
//! ```

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{
    AnalysisOrchestrator, LifecycleController, OrchestratorConfig, OrchestratorError,
    RecordStores,
};
pub use domain::{
    AcquisitionError, Checkout, ProgressEvent, ProgressSink, RepositoryAcquirer, ScanResult,
};
pub use infrastructure::{
    AnalysisDispatcher, ChannelProgressSink, GitAcquirerConfig, GitRepositoryAcquirer,
    NoOpProgressSink, TracingProgressSink, VecProgressSink,
};
