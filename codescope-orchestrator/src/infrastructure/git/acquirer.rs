use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use git2::{Cred, FetchOptions, RemoteCallbacks, build::RepoBuilder, opts};
use tracing::{debug, info, warn};

use codescope_core::config::GitConfig;
use codescope_core::domain::analysis::{Repository, RepositoryProvider};

use crate::domain::{AcquisitionError, Checkout, RepositoryAcquirer, ScanResult};
use crate::infrastructure::scanner::scan_directory;

/// Configuration for the Git acquirer.
#[derive(Debug, Clone)]
pub struct GitAcquirerConfig {
    /// Optional parent directory for temporary checkouts. Defaults to std::env::temp_dir().
    pub checkout_parent: Option<PathBuf>,
    /// Timeout applied to network fetches (passed down to libgit2).
    pub fetch_timeout: Duration,
    /// Token offered when the remote asks for credentials
    pub access_token: Option<String>,
    /// Only directories under this root may be used as `local` repositories
    pub local_root: Option<PathBuf>,
}

impl Default for GitAcquirerConfig {
    fn default() -> Self {
        Self::from(&GitConfig::default())
    }
}

impl From<&GitConfig> for GitAcquirerConfig {
    fn from(config: &GitConfig) -> Self {
        Self {
            checkout_parent: config.checkout_parent.clone(),
            fetch_timeout: Duration::from_secs(config.fetch_timeout_seconds),
            access_token: config.access_token.clone(),
            local_root: config.local_root.clone(),
        }
    }
}

/// Head commit of a checkout
type HeadInfo = (Option<String>, Option<DateTime<Utc>>);

impl From<git2::Error> for AcquisitionError {
    fn from(e: git2::Error) -> Self {
        AcquisitionError::Git(e.message().to_string())
    }
}

/// Acquires repositories by shallow-cloning them into temporary directories.
///
/// `local` repositories are used in place: their `remote_url` is a path on
/// this machine under the configured local root, and nothing is copied or
/// deleted.
#[derive(Debug)]
pub struct GitRepositoryAcquirer {
    checkout_parent: PathBuf,
    /// Canonical form of `config.local_root`
    local_root: Option<PathBuf>,
    config: GitAcquirerConfig,
}

impl GitRepositoryAcquirer {
    /// Create a new acquirer with the provided configuration.
    pub fn new(config: GitAcquirerConfig) -> std::io::Result<Self> {
        let checkout_parent = config
            .checkout_parent
            .clone()
            .unwrap_or_else(std::env::temp_dir);

        if !checkout_parent.exists() {
            std::fs::create_dir_all(&checkout_parent)?;
        }
        let local_root = config
            .local_root
            .as_deref()
            .map(std::fs::canonicalize)
            .transpose()?;

        Ok(Self {
            checkout_parent,
            local_root,
            config,
        })
    }

    /// Canonical directory for a `local` repository, confined to the local root.
    fn resolve_local(&self, remote_url: &str) -> Result<PathBuf, AcquisitionError> {
        let Some(root) = &self.local_root else {
            return Err(AcquisitionError::LocalDisabled(remote_url.to_string()));
        };
        let path = std::fs::canonicalize(remote_url)
            .map_err(|_| AcquisitionError::MissingPath(remote_url.to_string()))?;
        if !path.starts_with(root) {
            return Err(AcquisitionError::OutsideLocalRoot(remote_url.to_string()));
        }
        if !path.is_dir() {
            return Err(AcquisitionError::MissingPath(remote_url.to_string()));
        }
        Ok(path)
    }

    async fn acquire_local(&self, repository: &Repository) -> Result<Checkout, AcquisitionError> {
        let path = self.resolve_local(&repository.remote_url)?;

        let head_path = path.clone();
        let (commit_hash, commit_date) =
            tokio::task::spawn_blocking(move || Self::read_head(&head_path)).await?;

        debug!(repository_id = %repository.id, path = %path.display(), "Using local repository in place");
        Ok(Checkout::in_place(path, commit_hash, commit_date))
    }

    async fn acquire_remote(&self, repository: &Repository) -> Result<Checkout, AcquisitionError> {
        if !repository.remote_url.starts_with("https://") {
            return Err(AcquisitionError::UnsupportedScheme(
                repository.remote_url.clone(),
            ));
        }

        let checkout_dir = tempfile::Builder::new()
            .prefix("codescope-git-")
            .tempdir_in(&self.checkout_parent)?;
        let destination = checkout_dir.path().to_path_buf();
        let url = repository.remote_url.clone();
        let branch = repository.branch.clone();
        let token = self.config.access_token.clone();

        info!(
            repository_id = %repository.id,
            repository = %url,
            branch = %branch,
            "Starting Git clone"
        );

        Self::configure_git_timeouts(self.config.fetch_timeout)?;

        let (commit_hash, commit_date) = tokio::task::spawn_blocking(move || {
            Self::perform_clone(&destination, &url, &branch, token.as_deref())
        })
        .await??;

        debug!(
            repository_id = %repository.id,
            path = %checkout_dir.path().display(),
            commit = commit_hash.as_deref().unwrap_or("unknown"),
            "Git clone completed"
        );

        Ok(Checkout::temporary(checkout_dir, commit_hash, commit_date))
    }

    fn perform_clone(
        destination: &Path,
        repository_url: &str,
        branch: &str,
        token: Option<&str>,
    ) -> Result<HeadInfo, AcquisitionError> {
        let mut callbacks = RemoteCallbacks::new();
        if let Some(token_value) = token {
            let token_string = token_value.to_string();
            callbacks.credentials(move |_url, username_from_url, allowed| {
                if allowed.contains(git2::CredentialType::USER_PASS_PLAINTEXT) {
                    let username = username_from_url.unwrap_or("x-access-token");
                    Cred::userpass_plaintext(username, &token_string)
                } else {
                    Cred::default()
                }
            });
        }

        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(callbacks);
        fetch_options.download_tags(git2::AutotagOption::None);
        fetch_options.depth(1);

        let mut builder = RepoBuilder::new();
        builder.fetch_options(fetch_options);
        if !branch.is_empty() {
            builder.branch(branch);
        }
        builder.clone(repository_url, destination)?;

        Ok(Self::read_head(destination))
    }

    /// HEAD hash and commit time, or nothing when `path` is not a Git work tree.
    fn read_head(path: &Path) -> HeadInfo {
        let Ok(repo) = git2::Repository::open(path) else {
            return (None, None);
        };
        let Ok(commit) = repo.head().and_then(|head| head.peel_to_commit()) else {
            return (None, None);
        };
        let date = DateTime::from_timestamp(commit.time().seconds(), 0);
        (Some(commit.id().to_string()), date)
    }

    fn configure_git_timeouts(fetch_timeout: Duration) -> Result<(), AcquisitionError> {
        let timeout_ms = fetch_timeout.as_millis().clamp(1, i32::MAX as u128) as i32;
        unsafe {
            opts::set_server_connect_timeout_in_milliseconds(timeout_ms)?;
            opts::set_server_timeout_in_milliseconds(timeout_ms)?;
        }
        Ok(())
    }
}

#[async_trait]
impl RepositoryAcquirer for GitRepositoryAcquirer {
    async fn acquire(&self, repository: &Repository) -> Result<Checkout, AcquisitionError> {
        match repository.provider {
            RepositoryProvider::Local => self.acquire_local(repository).await,
            _ => self.acquire_remote(repository).await,
        }
    }

    async fn scan(
        &self,
        root: &Path,
        max_file_size: u64,
        exclude_patterns: &[String],
    ) -> Result<ScanResult, AcquisitionError> {
        let root = root.to_path_buf();
        let patterns = exclude_patterns.to_vec();
        tokio::task::spawn_blocking(move || scan_directory(&root, max_file_size, &patterns)).await?
    }

    async fn release(&self, checkout: Checkout) {
        if !checkout.is_temporary() {
            return;
        }
        let path = checkout.path().to_path_buf();
        match tokio::task::spawn_blocking(move || checkout.close()).await {
            Ok(Ok(())) => debug!(path = %path.display(), "Removed Git checkout"),
            Ok(Err(e)) => warn!(path = %path.display(), error = %e, "Failed to remove Git checkout"),
            Err(e) => warn!(path = %path.display(), error = %e, "Checkout cleanup task failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use codescope_core::domain::analysis::CodebaseId;
    use tempfile::TempDir;

    use super::*;

    fn acquirer(parent: &Path) -> GitRepositoryAcquirer {
        local_acquirer(parent, None)
    }

    fn local_acquirer(parent: &Path, local_root: Option<&Path>) -> GitRepositoryAcquirer {
        GitRepositoryAcquirer::new(GitAcquirerConfig {
            checkout_parent: Some(parent.to_path_buf()),
            fetch_timeout: Duration::from_secs(5),
            access_token: None,
            local_root: local_root.map(Path::to_path_buf),
        })
        .unwrap()
    }

    fn repository(provider: RepositoryProvider, url: &str) -> Repository {
        Repository::new(CodebaseId::generate(), "app", provider, url, "main")
    }

    #[tokio::test]
    async fn test_rejects_non_https_remote() {
        let parent = TempDir::new().unwrap();
        let err = acquirer(parent.path())
            .acquire(&repository(
                RepositoryProvider::Github,
                "git@github.com:acme/app.git",
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, AcquisitionError::UnsupportedScheme(_)));
    }

    #[tokio::test]
    async fn test_local_repository_is_scanned_in_place() {
        let parent = TempDir::new().unwrap();
        let source = TempDir::new().unwrap();
        fs::write(source.path().join("main.go"), "package main\n").unwrap();
        let acquirer = local_acquirer(parent.path(), Some(source.path()));

        let checkout = acquirer
            .acquire(&repository(
                RepositoryProvider::Local,
                source.path().to_str().unwrap(),
            ))
            .await
            .unwrap();
        assert!(!checkout.is_temporary());
        assert_eq!(checkout.commit_hash, None);

        let scan = acquirer.scan(checkout.path(), 1024, &[]).await.unwrap();
        assert_eq!(scan.total_files, 1);
        assert_eq!(scan.files[0].language, "Go");

        acquirer.release(checkout).await;
        assert!(source.path().join("main.go").exists());
    }

    #[tokio::test]
    async fn test_missing_local_path() {
        let parent = TempDir::new().unwrap();
        let root = TempDir::new().unwrap();
        let missing = root.path().join("not-here");
        let err = local_acquirer(parent.path(), Some(root.path()))
            .acquire(&repository(RepositoryProvider::Local, missing.to_str().unwrap()))
            .await
            .unwrap_err();
        assert!(matches!(err, AcquisitionError::MissingPath(_)));
    }

    #[tokio::test]
    async fn test_local_repositories_disabled_without_root() {
        let parent = TempDir::new().unwrap();
        let source = TempDir::new().unwrap();
        let err = acquirer(parent.path())
            .acquire(&repository(
                RepositoryProvider::Local,
                source.path().to_str().unwrap(),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, AcquisitionError::LocalDisabled(_)));
    }

    #[tokio::test]
    async fn test_local_path_outside_root_is_rejected() {
        let parent = TempDir::new().unwrap();
        let root = TempDir::new().unwrap();
        let allowed = root.path().join("allowed");
        let sibling = root.path().join("secrets");
        fs::create_dir_all(&allowed).unwrap();
        fs::create_dir_all(&sibling).unwrap();
        let acquirer = local_acquirer(parent.path(), Some(&allowed));

        for url in [
            sibling.to_str().unwrap().to_string(),
            format!("{}/../secrets", allowed.display()),
            "/".to_string(),
        ] {
            let err = acquirer
                .acquire(&repository(RepositoryProvider::Local, &url))
                .await
                .unwrap_err();
            assert!(
                matches!(err, AcquisitionError::OutsideLocalRoot(_)),
                "accepted {url}"
            );
        }
    }

    #[tokio::test]
    async fn test_release_removes_temporary_checkout() {
        let parent = TempDir::new().unwrap();
        let dir = tempfile::Builder::new()
            .prefix("codescope-git-")
            .tempdir_in(parent.path())
            .unwrap();
        let path = dir.path().to_path_buf();

        acquirer(parent.path())
            .release(Checkout::temporary(dir, None, None))
            .await;
        assert!(!path.exists());
    }
}
