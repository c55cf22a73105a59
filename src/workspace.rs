//! Private temp tree mirroring the staged content of the changed files.
//!
//! The tree is created before the first file is materialized and removed
//! exactly once: explicitly through [`Workspace::destroy`], or on drop when a
//! run unwinds early.

use std::path::{Component, Path, PathBuf};

use tempfile::TempDir;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{VcsQueryError, WorkspaceError, io_arc};
use crate::git::{ChangedFile, StagedSource};

const PREFIX: &str = "stagegate-";

/// Materializing one file failed
#[derive(Debug, Clone, Error)]
pub enum MaterializeError {
    /// Scoped to this file; the run continues
    #[error(transparent)]
    Vcs(#[from] VcsQueryError),

    /// The workspace itself is unusable
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
}

#[derive(Debug)]
pub struct Workspace {
    dir: Option<TempDir>,
    root: PathBuf,
}

impl Workspace {
    /// Create an owner-only directory under the system temp dir
    pub fn create() -> Result<Self, WorkspaceError> {
        Self::create_in(std::env::temp_dir())
    }

    pub fn create_in(parent: impl AsRef<Path>) -> Result<Self, WorkspaceError> {
        // tempfile creates the directory with mode 0700 on unix
        let dir = tempfile::Builder::new()
            .prefix(PREFIX)
            .tempdir_in(parent)
            .map_err(|err| WorkspaceError::Create(io_arc(err)))?;
        let root = dir.path().to_path_buf();
        debug!(path = %root.display(), "Created temporary workspace");

        Ok(Self {
            dir: Some(dir),
            root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where `file` lands inside the tree; only plain relative paths qualify
    pub fn mirror_path(&self, file: &ChangedFile) -> Result<PathBuf, WorkspaceError> {
        let mut path = self.root.clone();
        let mut depth = 0usize;
        for component in file.path().components() {
            match component {
                Component::Normal(part) => {
                    path.push(part);
                    depth += 1;
                }
                Component::CurDir => {}
                _ => return Err(WorkspaceError::UnsafePath(file.path().to_path_buf())),
            }
        }
        if depth == 0 {
            return Err(WorkspaceError::UnsafePath(file.path().to_path_buf()));
        }
        Ok(path)
    }

    /// Write the staged content of `file` into the tree and return its path.
    ///
    /// On a VCS failure the partial file is removed so no plugin ever sees it.
    pub async fn materialize<S: StagedSource>(
        &self,
        file: &ChangedFile,
        source: &S,
    ) -> Result<PathBuf, MaterializeError> {
        let target = self.mirror_path(file)?;
        if let Some(parent) = target.parent() {
            create_private_dirs(parent).await?;
        }

        let mut out = create_private_file(&target).await?;
        match source.copy_staged_content(file, &mut out).await {
            Ok(bytes) => {
                out.flush().await.map_err(|err| WorkspaceError::Write {
                    path: target.clone(),
                    source: io_arc(err),
                })?;
                debug!(file = %file, bytes, "Materialized staged content");
                Ok(target)
            }
            Err(err) => {
                drop(out);
                if let Err(remove_err) = tokio::fs::remove_file(&target).await {
                    debug!(
                        path = %target.display(),
                        error = %remove_err,
                        "Failed to remove partial file"
                    );
                }
                Err(MaterializeError::Vcs(err))
            }
        }
    }

    /// Remove the tree and everything in it
    pub fn destroy(mut self) -> Result<(), WorkspaceError> {
        match self.dir.take() {
            Some(dir) => {
                dir.close().map_err(|err| WorkspaceError::Destroy {
                    path: self.root.clone(),
                    source: io_arc(err),
                })?;
                debug!(path = %self.root.display(), "Removed temporary workspace");
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            if let Err(err) = dir.close() {
                warn!(
                    path = %self.root.display(),
                    error = %err,
                    "Failed to remove temporary workspace"
                );
            }
        }
    }
}

async fn create_private_dirs(path: &Path) -> Result<(), WorkspaceError> {
    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o700);

    builder
        .create(path)
        .await
        .map_err(|err| WorkspaceError::Write {
            path: path.to_path_buf(),
            source: io_arc(err),
        })
}

async fn create_private_file(path: &Path) -> Result<tokio::fs::File, WorkspaceError> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    options.open(path).await.map_err(|err| WorkspaceError::Write {
        path: path.to_path_buf(),
        source: io_arc(err),
    })
}
