pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{
    AiAnalysisCoordinator, CodeAnalysisOutcome, CoordinatorConfig, average_scores, compute_scores,
};
pub use domain::*;
pub use infrastructure::prompts;
pub use infrastructure::providers::{OpenAiCompatibleReviewer, RetryPolicy, RetryingReviewer};
