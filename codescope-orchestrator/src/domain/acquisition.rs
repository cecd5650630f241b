//! Repository acquisition contract
//!
//! The orchestrator gets a local copy of each repository through
//! [`RepositoryAcquirer`], scans it into [`SourceFile`]s, and releases it.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tempfile::TempDir;

use codescope_core::domain::analysis::{LanguageLineCounts, Repository, SourceFile};

/// A local copy of a repository, ready to scan.
///
/// A temporary checkout owns its directory: dropping the checkout deletes
/// it, so a checkout can never outlive its run even on early returns.
#[derive(Debug)]
pub struct Checkout {
    path: PathBuf,
    /// HEAD commit hash, when resolvable
    pub commit_hash: Option<String>,
    pub commit_date: Option<DateTime<Utc>>,
    guard: Option<TempDir>,
}

impl Checkout {
    /// Checkout backed by a temporary directory that is removed on release
    pub fn temporary(
        dir: TempDir,
        commit_hash: Option<String>,
        commit_date: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            path: dir.path().to_path_buf(),
            commit_hash,
            commit_date,
            guard: Some(dir),
        }
    }

    /// Checkout of a directory that already exists and must be left alone
    pub fn in_place(
        path: impl Into<PathBuf>,
        commit_hash: Option<String>,
        commit_date: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            path: path.into(),
            commit_hash,
            commit_date,
            guard: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_temporary(&self) -> bool {
        self.guard.is_some()
    }

    /// Delete the temporary directory now, surfacing any I/O error.
    pub fn close(self) -> std::io::Result<()> {
        match self.guard {
            Some(dir) => dir.close(),
            None => Ok(()),
        }
    }
}

/// Files of one scanned checkout plus their totals
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    /// Text files in path order
    pub files: Vec<SourceFile>,
    pub total_files: u64,
    pub total_lines: u64,
    pub languages_by_line_count: LanguageLineCounts,
}

impl ScanResult {
    /// Build a result from `files`, deriving the totals.
    pub fn from_files(files: Vec<SourceFile>) -> Self {
        let mut languages_by_line_count = LanguageLineCounts::new();
        let mut total_lines = 0;
        for file in &files {
            let lines = file.line_count();
            total_lines += lines;
            *languages_by_line_count
                .entry(file.language.clone())
                .or_insert(0) += lines;
        }

        Self {
            total_files: files.len() as u64,
            total_lines,
            languages_by_line_count,
            files,
        }
    }
}

/// Errors from acquiring or scanning a repository
#[derive(Debug, thiserror::Error)]
pub enum AcquisitionError {
    #[error("Unsupported Git URL scheme for {0}. Only HTTPS is supported.")]
    UnsupportedScheme(String),
    #[error("Local repository path does not exist: {0}")]
    MissingPath(String),
    #[error("Local repository path is outside the allowed root: {0}")]
    OutsideLocalRoot(String),
    #[error("Local repositories are disabled (git.local_root is unset): {0}")]
    LocalDisabled(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Git operation failed: {0}")]
    Git(String),
    #[error("Invalid exclude pattern {pattern}: {message}")]
    InvalidPattern { pattern: String, message: String },
    #[error("Blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Source of local repository copies
#[async_trait]
pub trait RepositoryAcquirer: Send + Sync {
    /// Obtain a local copy of `repository` at its configured branch.
    async fn acquire(&self, repository: &Repository) -> Result<Checkout, AcquisitionError>;

    /// List the analysable files under `root`.
    ///
    /// Files larger than `max_file_size` bytes and paths matching any of
    /// `exclude_patterns` are left out.
    async fn scan(
        &self,
        root: &Path,
        max_file_size: u64,
        exclude_patterns: &[String],
    ) -> Result<ScanResult, AcquisitionError>;

    /// Give back a checkout obtained from [`acquire`](Self::acquire).
    async fn release(&self, checkout: Checkout);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_result_totals() {
        let result = ScanResult::from_files(vec![
            SourceFile::new("a.rs", "Rust", "fn a() {}\nfn b() {}\n"),
            SourceFile::new("b.rs", "Rust", "fn c() {}"),
            SourceFile::new("c.py", "Python", "x = 1\n"),
        ]);
        assert_eq!(result.total_files, 3);
        assert_eq!(result.total_lines, 4);
        assert_eq!(result.languages_by_line_count["Rust"], 3);
        assert_eq!(result.languages_by_line_count["Python"], 1);
    }

    #[test]
    fn test_temporary_checkout_removed_on_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_path_buf();
        let checkout = Checkout::temporary(dir, Some("abc".into()), None);
        assert!(checkout.is_temporary());
        assert!(path.exists());
        checkout.close().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_in_place_checkout_leaves_directory() {
        let dir = tempfile::tempdir().unwrap();
        let checkout = Checkout::in_place(dir.path(), None, None);
        assert!(!checkout.is_temporary());
        checkout.close().unwrap();
        assert!(dir.path().exists());
    }
}
