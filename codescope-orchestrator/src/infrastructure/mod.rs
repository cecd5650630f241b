//! Infrastructure Layer - repository acquisition, progress sinks and dispatch

pub mod dispatcher;
pub mod git;
pub mod progress;
pub mod scanner;

pub use dispatcher::AnalysisDispatcher;
pub use git::{GitAcquirerConfig, GitRepositoryAcquirer};
pub use progress::{ChannelProgressSink, NoOpProgressSink, TracingProgressSink, VecProgressSink};
