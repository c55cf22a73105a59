//! Plugin discovery
//!
//! Every regular, executable file directly inside the plugin directory is a
//! plugin. Entries are visited in file-name order; anything else is skipped
//! with an informational log line.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{CompositeChecker, ExecutablePlugin, Plugin, PluginSet};
use crate::config::GateConfig;

/// Why a directory entry is not a plugin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skipped {
    NotAFile,
    NotExecutable,
    Unreadable,
}

#[derive(Debug, Clone)]
pub struct PluginRegistry {
    dir: PathBuf,
}

impl PluginRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Start a discovery pass. Each call restarts from the first entry.
    pub fn discover(&self) -> Discovery {
        let mut entries = match std::fs::read_dir(&self.dir) {
            Ok(read_dir) => read_dir
                .filter_map(|entry| match entry {
                    Ok(entry) => Some(entry.path()),
                    Err(err) => {
                        warn!(dir = %self.dir.display(), error = %err, "Failed to read plugin directory entry");
                        None
                    }
                })
                .collect(),
            Err(err) => {
                warn!(
                    dir = %self.dir.display(),
                    error = %err,
                    "Plugin directory is not readable, no plugins will run"
                );
                Vec::new()
            }
        };
        entries.sort();

        Discovery {
            entries: entries.into_iter(),
        }
    }

    /// Every enabled plugin: discovered executables first, then configured
    /// checkers, in a stable order
    pub fn load(&self, config: &GateConfig) -> PluginSet {
        let mut plugins: PluginSet = Vec::new();

        for plugin in self.discover() {
            if config.is_plugin_enabled(plugin.name()) {
                plugins.push(Arc::new(plugin));
            } else {
                info!(plugin = plugin.name(), "Plugin disabled by configuration");
            }
        }

        for checker in config.active_checkers() {
            if checker.steps.is_empty() {
                warn!(checker = %checker.name, "Checker has no steps, ignoring it");
                continue;
            }
            plugins.push(CompositeChecker::from_config(checker));
        }

        debug!(count = plugins.len(), dir = %self.dir.display(), "Loaded plugins");
        plugins
    }
}

/// Lazy, finite, ordered sequence of discovered plugins
#[derive(Debug)]
pub struct Discovery {
    entries: std::vec::IntoIter<PathBuf>,
}

impl Iterator for Discovery {
    type Item = ExecutablePlugin;

    fn next(&mut self) -> Option<Self::Item> {
        for path in self.entries.by_ref() {
            match eligibility(&path) {
                Ok(()) => return Some(ExecutablePlugin::new(path)),
                Err(Skipped::NotAFile) => {
                    info!(path = %path.display(), "Non-file in plugin directory");
                }
                Err(Skipped::NotExecutable) => {
                    info!(path = %path.display(), "Non-executable file in plugin directory");
                }
                Err(Skipped::Unreadable) => {
                    info!(path = %path.display(), "Unreadable entry in plugin directory");
                }
            }
        }
        None
    }
}

/// Symlinks are followed; a link to an executable file is a plugin
pub fn eligibility(path: &Path) -> Result<(), Skipped> {
    let metadata = std::fs::metadata(path).map_err(|_| Skipped::Unreadable)?;
    if !metadata.is_file() {
        return Err(Skipped::NotAFile);
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if metadata.permissions().mode() & 0o111 == 0 {
            return Err(Skipped::NotExecutable);
        }
    }

    Ok(())
}
