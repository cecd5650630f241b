//! Scanned source files

use serde::{Deserialize, Serialize};

/// One text file picked up by a repository scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    /// Path relative to the repository root, `/`-separated
    pub path: String,
    pub content: String,
    /// Language name (e.g. `Rust`, `TypeScript`), `Other` when unknown
    pub language: String,
    /// Size on disk in bytes
    pub size: u64,
}

impl SourceFile {
    pub fn new(
        path: impl Into<String>,
        language: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let content = content.into();
        Self {
            path: path.into(),
            language: language.into(),
            size: content.len() as u64,
            content,
        }
    }

    /// Number of lines, counting a trailing partial line.
    pub fn line_count(&self) -> u64 {
        self.content.lines().count() as u64
    }
}
