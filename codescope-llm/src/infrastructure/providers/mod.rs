pub mod openai;
pub mod retrying;

pub use openai::OpenAiCompatibleReviewer;
pub use retrying::{RetryPolicy, RetryingReviewer};
