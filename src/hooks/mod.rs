//! Git hook integration
//!
//! A run is hook-triggered when git exported its hook environment (by
//! default `GIT_INDEX_FILE`, which `git commit` always sets for the
//! pre-commit hook) or when the running binary is the installed hook itself.
//! Manual runs install instead.

use crate::config::GateConfig;
use crate::git::GitRepo;
use self::installer::is_same_file;

pub mod installer;
pub mod pre_commit;

pub use installer::{Freshness, Installer, run_plugin_installs};
pub use pre_commit::{HookContext, RunOptions};

/// Whether git is running us as a hook
pub fn is_hook_invocation(config: &GateConfig) -> bool {
    marker_is_set(config) || runs_as_installed_hook(config)
}

fn marker_is_set(config: &GateConfig) -> bool {
    std::env::var_os(&config.hook.env_marker).is_some_and(|value| !value.is_empty())
}

fn runs_as_installed_hook(config: &GateConfig) -> bool {
    let Ok(exe) = std::env::current_exe() else {
        return false;
    };
    let Ok(repo) = GitRepo::discover() else {
        return false;
    };
    is_same_file(&exe, &repo.hook_path(&config.hook.name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_marker_is_index_file() {
        assert_eq!(GateConfig::default().hook.env_marker, "GIT_INDEX_FILE");
    }

    #[test]
    fn test_unset_marker_is_not_set() {
        let mut config = GateConfig::default();
        config.hook.env_marker = "STAGEGATE_TEST_MARKER_THAT_IS_NEVER_SET".to_string();
        assert!(!marker_is_set(&config));
    }

    #[test]
    fn test_present_marker_is_hook_run() {
        // PATH is set in every test environment
        let mut config = GateConfig::default();
        config.hook.env_marker = "PATH".to_string();
        assert!(is_hook_invocation(&config));
    }

    #[test]
    fn test_installed_hook_path_is_recognised() {
        let dir = TempDir::new().unwrap();
        let hooks = dir.path().join("hooks");
        fs::create_dir_all(&hooks).unwrap();
        let hook = hooks.join("pre-commit");
        fs::write(&hook, "binary").unwrap();
        let other = dir.path().join("stagegate");
        fs::write(&other, "binary").unwrap();

        assert!(is_same_file(&hook, &dir.path().join("hooks/../hooks/pre-commit")));
        assert!(!is_same_file(&other, &hook));
        assert!(!is_same_file(&dir.path().join("missing"), &hook));
    }
}
