//! Common test utilities and a scripted reviewer

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use codescope_core::domain::analysis::SourceFile;
use codescope_llm::domain::{ModelReviewer, ReviewerError};

/// Marker that only the summary prompt carries
pub const SUMMARY_MARKER: &str = "Return ONLY a JSON object";

/// Reviewer that replays canned answers in order.
///
/// Batch prompts consume `batch_responses`; the summary prompt gets
/// `summary_response`. Every prompt is captured for inspection.
pub struct ScriptedReviewer {
    batch_responses: Mutex<VecDeque<Result<String, ReviewerError>>>,
    summary_response: Mutex<Option<Result<String, ReviewerError>>>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedReviewer {
    pub fn new() -> Self {
        Self {
            batch_responses: Mutex::new(VecDeque::new()),
            summary_response: Mutex::new(None),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_batch(self, response: Result<String, ReviewerError>) -> Self {
        self.batch_responses.lock().unwrap().push_back(response);
        self
    }

    pub fn with_batch_text(self, text: &str) -> Self {
        self.with_batch(Ok(text.to_string()))
    }

    pub fn with_summary(self, response: Result<String, ReviewerError>) -> Self {
        *self.summary_response.lock().unwrap() = Some(response);
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn batch_prompts(&self) -> Vec<String> {
        self.prompts()
            .into_iter()
            .filter(|p| !p.contains(SUMMARY_MARKER))
            .collect()
    }
}

#[async_trait]
impl ModelReviewer for ScriptedReviewer {
    async fn review(&self, prompt: &str) -> Result<String, ReviewerError> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        if prompt.contains(SUMMARY_MARKER) {
            return self
                .summary_response
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(ReviewerError::Timeout));
        }

        self.batch_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("[]".to_string()))
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

pub fn source_file(path: &str, language: &str, content: &str) -> SourceFile {
    SourceFile::new(path, language, content)
}

/// `count` small TypeScript files named `src/file_{i}.ts`
pub fn typescript_files(count: usize) -> Vec<SourceFile> {
    (0..count)
        .map(|i| source_file(&format!("src/file_{i}.ts"), "TypeScript", "export const x = 1;\n"))
        .collect()
}
