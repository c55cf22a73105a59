//! Hook installation and the staleness check run before every hook.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, info};

use crate::config::GateConfig;
use crate::error::{InstallError, io_arc};
use crate::git::GitRepo;
use crate::plugins::{InvocationMode, PluginInvoker, PluginOutcome, PluginSet};

/// Result of comparing the installed hook with its source-of-truth copy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    /// Nothing to compare against; the check is skipped
    SourceMissing(PathBuf),
    /// Bare repository, there is no repository copy to compare against
    NoWorkTree,
}

pub struct Installer<'a> {
    repo: &'a GitRepo,
    config: &'a GateConfig,
}

impl<'a> Installer<'a> {
    pub fn new(repo: &'a GitRepo, config: &'a GateConfig) -> Self {
        Self { repo, config }
    }

    pub fn hook_path(&self) -> PathBuf {
        self.repo.hook_path(&self.config.hook.name)
    }

    /// Source-of-truth copy inside the working tree, if there is a working tree
    pub fn source_path(&self) -> Option<PathBuf> {
        self.repo
            .workdir()
            .ok()
            .map(|workdir| self.config.hook_source_path(workdir))
    }

    pub fn is_installed(&self) -> bool {
        self.hook_path().is_file()
    }

    /// Install the running executable as the hook
    pub fn install(&self) -> Result<PathBuf, InstallError> {
        let exe = std::env::current_exe().map_err(|err| InstallError::CurrentExe(io_arc(err)))?;
        self.install_from(&exe)
    }

    /// Copy `source` over the hook, keeping its permissions and modification
    /// time. The copy lands next to the hook first and is renamed into place.
    pub fn install_from(&self, source: &Path) -> Result<PathBuf, InstallError> {
        let dest = self.hook_path();
        let copy_error = |err: std::io::Error| InstallError::Copy {
            source_path: source.to_path_buf(),
            dest: dest.clone(),
            source: io_arc(err),
        };

        if is_same_file(source, &dest) {
            info!(hook = %dest.display(), "Hook is already the running executable");
            return Ok(dest);
        }

        let hooks_dir = dest
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.repo.hooks_dir());
        fs::create_dir_all(&hooks_dir).map_err(copy_error)?;

        let staging = hooks_dir.join(format!(".{}.stagegate-tmp", self.config.hook.name));
        fs::copy(source, &staging).map_err(copy_error)?;

        let modified = modified_time(source)?;
        let result = fs::OpenOptions::new()
            .write(true)
            .open(&staging)
            .and_then(|file| file.set_modified(modified))
            .and_then(|()| ensure_executable(&staging))
            .and_then(|()| fs::rename(&staging, &dest));
        if let Err(err) = result {
            let _ = fs::remove_file(&staging);
            return Err(copy_error(err));
        }

        debug!(from = %source.display(), to = %dest.display(), "Installed hook");
        Ok(dest)
    }

    /// Refuse to run an installed hook older than the repository's copy
    pub fn check_freshness(&self) -> Result<Freshness, InstallError> {
        let installed = self.hook_path();
        let installed_time = match fs::metadata(&installed) {
            Ok(metadata) => metadata.modified().map_err(|err| InstallError::Metadata {
                path: installed.clone(),
                source: io_arc(err),
            })?,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(InstallError::NotInstalled(installed));
            }
            Err(err) => {
                return Err(InstallError::Metadata {
                    path: installed,
                    source: io_arc(err),
                });
            }
        };

        let Some(source) = self.source_path() else {
            return Ok(Freshness::NoWorkTree);
        };
        let source_time = match fs::metadata(&source) {
            Ok(_) => modified_time(&source)?,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(source = %source.display(), "No hook source copy, skipping staleness check");
                return Ok(Freshness::SourceMissing(source));
            }
            Err(err) => {
                return Err(InstallError::Metadata {
                    path: source,
                    source: io_arc(err),
                });
            }
        };

        if source_time > installed_time {
            return Err(InstallError::Stale {
                source_path: source,
                installed,
            });
        }
        Ok(Freshness::Fresh)
    }

    /// Remove the hook; `false` when there was nothing to remove
    pub fn uninstall(&self) -> Result<bool, InstallError> {
        let hook = self.hook_path();
        match fs::remove_file(&hook) {
            Ok(()) => {
                debug!(hook = %hook.display(), "Removed hook");
                Ok(true)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(InstallError::Copy {
                source_path: hook.clone(),
                dest: hook,
                source: io_arc(err),
            }),
        }
    }
}

/// Run every plugin's `install` mode, in plugin order
pub async fn run_plugin_installs(
    plugins: &PluginSet,
    invoker: &PluginInvoker,
) -> Vec<PluginOutcome> {
    let mut outcomes = Vec::with_capacity(plugins.len());
    for plugin in plugins {
        outcomes.push(
            invoker
                .invoke(plugin.as_ref(), &InvocationMode::Install)
                .await,
        );
    }
    outcomes
}

fn modified_time(path: &Path) -> Result<SystemTime, InstallError> {
    fs::metadata(path)
        .and_then(|metadata| metadata.modified())
        .map_err(|err| InstallError::Metadata {
            path: path.to_path_buf(),
            source: io_arc(err),
        })
}

pub(crate) fn is_same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(unix)]
fn ensure_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = fs::metadata(path)?.permissions();
    if perms.mode() & 0o111 == 0 {
        perms.set_mode(0o755);
        fs::set_permissions(path, perms)?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn ensure_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Repo {
        dir: TempDir,
        repo: GitRepo,
    }

    fn init_repo() -> Repo {
        let dir = TempDir::new().unwrap();
        git2::Repository::init(dir.path()).unwrap();
        let repo = GitRepo::open(dir.path()).unwrap();
        Repo { dir, repo }
    }

    fn write_binary(path: &Path, age: Duration) {
        fs::write(path, "#!/bin/sh\nexit 0\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
        }
        set_age(path, age);
    }

    fn set_age(path: &Path, age: Duration) {
        let file = fs::OpenOptions::new().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    #[test]
    fn test_install_preserves_mode_and_mtime() {
        let fixture = init_repo();
        let config = GateConfig::default();
        let source = fixture.dir.path().join("pre-commit");
        write_binary(&source, Duration::from_secs(3600));

        let installer = Installer::new(&fixture.repo, &config);
        let dest = installer.install_from(&source).unwrap();

        assert_eq!(dest, fixture.repo.git_dir().join("hooks").join("pre-commit"));
        assert!(installer.is_installed());
        assert_eq!(
            fs::metadata(&dest).unwrap().modified().unwrap(),
            fs::metadata(&source).unwrap().modified().unwrap()
        );
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            assert_eq!(fs::metadata(&dest).unwrap().permissions().mode() & 0o777, 0o755);
        }
        assert_eq!(installer.check_freshness().unwrap(), Freshness::Fresh);
    }

    #[test]
    fn test_newer_source_is_stale() {
        let fixture = init_repo();
        let config = GateConfig::default();
        let source = fixture.dir.path().join("pre-commit");
        write_binary(&source, Duration::from_secs(3600));

        let installer = Installer::new(&fixture.repo, &config);
        installer.install_from(&source).unwrap();
        set_age(&source, Duration::from_secs(60));

        let err = installer.check_freshness().unwrap_err();
        assert!(matches!(err, InstallError::Stale { .. }));
    }

    #[test]
    fn test_missing_source_skips_check() {
        let fixture = init_repo();
        let config = GateConfig::default();
        let elsewhere = TempDir::new().unwrap();
        let binary = elsewhere.path().join("stagegate");
        write_binary(&binary, Duration::from_secs(10));

        let installer = Installer::new(&fixture.repo, &config);
        installer.install_from(&binary).unwrap();

        assert!(matches!(
            installer.check_freshness().unwrap(),
            Freshness::SourceMissing(_)
        ));
    }

    #[test]
    fn test_bare_repository_has_no_work_tree() {
        let dir = TempDir::new().unwrap();
        git2::Repository::init_bare(dir.path()).unwrap();
        let repo = GitRepo::open(dir.path()).unwrap();
        let config = GateConfig::default();
        let elsewhere = TempDir::new().unwrap();
        let binary = elsewhere.path().join("stagegate");
        write_binary(&binary, Duration::from_secs(10));

        let installer = Installer::new(&repo, &config);
        let dest = installer.install_from(&binary).unwrap();

        assert_eq!(dest, dir.path().join("hooks").join("pre-commit"));
        assert_eq!(installer.source_path(), None);
        assert_eq!(installer.check_freshness().unwrap(), Freshness::NoWorkTree);
    }

    #[test]
    fn test_not_installed() {
        let fixture = init_repo();
        let config = GateConfig::default();
        let installer = Installer::new(&fixture.repo, &config);

        assert!(!installer.is_installed());
        assert!(matches!(
            installer.check_freshness().unwrap_err(),
            InstallError::NotInstalled(_)
        ));
    }

    #[test]
    fn test_uninstall_is_idempotent() {
        let fixture = init_repo();
        let config = GateConfig::default();
        let source = fixture.dir.path().join("pre-commit");
        write_binary(&source, Duration::from_secs(10));

        let installer = Installer::new(&fixture.repo, &config);
        installer.install_from(&source).unwrap();

        assert!(installer.uninstall().unwrap());
        assert!(!installer.uninstall().unwrap());
        assert!(!installer.is_installed());
    }

    #[test]
    fn test_custom_hook_name() {
        let fixture = init_repo();
        let mut config = GateConfig::default();
        config.hook.name = "pre-merge-commit".to_string();
        let installer = Installer::new(&fixture.repo, &config);

        assert!(installer.hook_path().ends_with("hooks/pre-merge-commit"));
    }
}
