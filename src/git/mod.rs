//! Git integration layer for stagegate
//!
//! [`GitRepo`] uses git2 to locate the repository and its hooks directory.
//! Staged content is read through [`StagedSource`], implemented by
//! [`GitCli`] on top of the `git` executable so that everything git exports
//! to a running hook (`GIT_DIR`, `GIT_INDEX_FILE`) is honored.

use std::future::Future;
use std::path::{Path, PathBuf};

use git2::Repository;
use tokio::io::AsyncWrite;

use crate::error::VcsQueryError;

pub mod operations;

pub use operations::GitCli;

/// Object id of the empty tree, the diff base before the first commit
pub const EMPTY_TREE: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";

/// A staged path relative to the repository root
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChangedFile {
    path: PathBuf,
}

impl ChangedFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Display for ChangedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// Read-only view of the index
pub trait StagedSource: Send + Sync {
    /// Files added or modified in the index relative to `HEAD`, in the order
    /// the VCS reports them. Deletions, renames and copies are excluded.
    fn list_changed_files(
        &self,
    ) -> impl Future<Output = Result<Vec<ChangedFile>, VcsQueryError>> + Send;

    /// Stream the staged blob of `file` into `sink`, returning the byte count
    fn copy_staged_content<W>(
        &self,
        file: &ChangedFile,
        sink: &mut W,
    ) -> impl Future<Output = Result<u64, VcsQueryError>> + Send
    where
        W: AsyncWrite + Unpin + Send;
}

/// Git repository handle
pub struct GitRepo {
    repo: Repository,
}

impl GitRepo {
    /// Open the repository git points us at (`GIT_DIR`), or discover it from
    /// the current directory
    pub fn discover() -> Result<Self, VcsQueryError> {
        let repo = Repository::open_from_env().map_err(|err| VcsQueryError::NoRepository {
            message: err.message().to_string(),
        })?;
        Ok(Self { repo })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, VcsQueryError> {
        let repo = Repository::open(path).map_err(|err| VcsQueryError::NoRepository {
            message: err.message().to_string(),
        })?;
        Ok(Self { repo })
    }

    /// The `.git` directory
    pub fn git_dir(&self) -> &Path {
        self.repo.path()
    }

    pub fn workdir(&self) -> Result<&Path, VcsQueryError> {
        self.repo
            .workdir()
            .ok_or_else(|| VcsQueryError::NoRepository {
                message: "bare repository has no working tree".to_string(),
            })
    }

    /// `core.hooksPath` when configured, `<git dir>/hooks` otherwise
    pub fn hooks_dir(&self) -> PathBuf {
        let configured = self
            .repo
            .config()
            .and_then(|config| config.get_path("core.hooksPath"))
            .ok();

        match configured {
            Some(path) if path.is_absolute() => path,
            Some(path) => match self.repo.workdir() {
                Some(workdir) => workdir.join(path),
                None => self.repo.path().join(path),
            },
            None => self.repo.path().join("hooks"),
        }
    }

    pub fn hook_path(&self, hook_name: &str) -> PathBuf {
        self.hooks_dir().join(hook_name)
    }

    pub fn has_head(&self) -> bool {
        self.repo.head().is_ok()
    }

    /// Staged-content reader rooted at the working tree
    pub fn staged_source(&self) -> Result<GitCli, VcsQueryError> {
        Ok(GitCli::new(self.workdir()?))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_reports_missing_repository() {
        let temp = TempDir::new().unwrap();
        let err = GitRepo::open(temp.path()).err().unwrap();
        assert!(matches!(err, VcsQueryError::NoRepository { .. }));
    }

    #[test]
    fn test_hooks_dir_defaults_under_git_dir() {
        let temp = TempDir::new().unwrap();
        Repository::init(temp.path()).unwrap();

        let repo = GitRepo::open(temp.path()).unwrap();
        assert_eq!(repo.hooks_dir(), repo.git_dir().join("hooks"));
        assert_eq!(
            repo.hook_path("pre-commit"),
            repo.git_dir().join("hooks").join("pre-commit")
        );
        assert!(!repo.has_head());
    }

    #[test]
    fn test_hooks_dir_honors_core_hooks_path() {
        let temp = TempDir::new().unwrap();
        let raw = Repository::init(temp.path()).unwrap();
        raw.config()
            .unwrap()
            .set_str("core.hooksPath", "githooks")
            .unwrap();

        let repo = GitRepo::open(temp.path()).unwrap();
        let workdir = repo.workdir().unwrap().to_path_buf();
        assert_eq!(repo.hooks_dir(), workdir.join("githooks"));
    }
}
