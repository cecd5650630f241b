pub mod coordinator;
pub mod scoring;

pub use coordinator::{AiAnalysisCoordinator, CodeAnalysisOutcome, CoordinatorConfig};
pub use scoring::{average_scores, compute_scores, language_line_counts, language_percentages};
