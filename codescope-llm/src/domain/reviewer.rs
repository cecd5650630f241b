//! Model reviewer trait

use async_trait::async_trait;

use super::error::ReviewerError;

/// A language model that reads a prompt and answers with free text.
///
/// Answers are best-effort: callers must parse them defensively.
#[async_trait]
pub trait ModelReviewer: Send + Sync {
    /// Send `prompt` and return the model's text response.
    async fn review(&self, prompt: &str) -> Result<String, ReviewerError>;

    /// Model identifier, for logs
    fn model(&self) -> &str;
}
