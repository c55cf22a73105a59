use anyhow::{Context, Result, bail};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::path::{Path, PathBuf};

use super::GateConfig;

// Embed the default config at compile time
const DEFAULT_CONFIG: &str = include_str!("../../default-config.toml");

/// Prefix for environment overrides; nested keys are separated by `__`
pub const ENV_PREFIX: &str = "STAGEGATE_";

/// Repository-level configuration file, looked up in the working directory
pub const REPO_CONFIG_FILE: &str = "stagegate.toml";

impl GateConfig {
    pub fn load(custom_config: Option<&Path>) -> Result<Self> {
        Self::figment(custom_config)?
            .extract()
            .context("Invalid stagegate configuration")
    }

    /// The merged provider chain, lowest priority first
    pub fn figment(custom_config: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::new()
            .merge(Toml::string(DEFAULT_CONFIG))
            .merge(Toml::file(Self::user_config_path()))
            .merge(Toml::file(REPO_CONFIG_FILE));

        if let Some(path) = custom_config {
            if !path.is_file() {
                bail!("Configuration file not found: {}", path.display());
            }
            figment = figment.merge(Toml::file(path));
        }

        // Environment variables always have highest priority
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Render the effective configuration
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }

    fn user_config_path() -> PathBuf {
        match std::env::var("HOME") {
            Ok(home) => PathBuf::from(home).join(".config/stagegate/config.toml"),
            Err(_) => PathBuf::from("~/.config/stagegate/config.toml"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StepKind;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_config_loading() {
        let config = GateConfig::load(None);
        assert!(config.is_ok(), "Should load default config successfully");
    }

    #[test]
    fn test_config_loads_defaults() {
        let figment = Figment::new().merge(Toml::string(DEFAULT_CONFIG));
        let config: GateConfig = figment.extract().expect("defaults parse");

        assert!(!config.debug);
        assert_eq!(config.hook.name, "pre-commit");
        assert_eq!(config.hook.env_marker, "GIT_INDEX_FILE");
        assert_eq!(config.gate.plugin_dir, PathBuf::from("pre-commit-plugins"));
        assert_eq!(config.gate.mime_command[0], "file");

        let python = config
            .checkers
            .iter()
            .find(|c| c.name == "python")
            .expect("python checker present");
        assert!(!python.enabled);
        assert_eq!(python.steps[0].kind, StepKind::Syntax);
        assert!(!python.steps[1].is_blocking());

        let erb = config
            .checkers
            .iter()
            .find(|c| c.name == "erb")
            .expect("erb checker present");
        assert_eq!(erb.extensions, vec!["erb".to_string()]);
        assert_eq!(erb.steps.len(), 1);
        assert!(erb.steps[0].command.iter().any(|arg| arg == "{temp}"));

        // Shipped checkers are opt-in
        assert_eq!(config.active_checkers().count(), 0);
    }

    #[test]
    fn test_custom_config_overrides_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("custom.toml");
        fs::write(
            &path,
            r#"
debug = true

[gate]
timeout_secs = 5
plugin_dir = "hooks/plugins"

[plugins]
check-ruby = false
"#,
        )
        .unwrap();

        let config = GateConfig::load(Some(&path)).unwrap();
        assert!(config.debug);
        assert_eq!(config.gate.timeout_secs, 5);
        assert_eq!(config.gate.plugin_dir, PathBuf::from("hooks/plugins"));
        assert!(!config.is_plugin_enabled("check-ruby"));
        // Untouched keys keep their defaults
        assert_eq!(config.gate.thread_percentage, 75);
    }

    #[test]
    fn test_missing_custom_config_is_an_error() {
        let config = GateConfig::load(Some(Path::new("non_existent.toml")));
        assert!(config.is_err());
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let config = GateConfig::load(None).unwrap();
        let rendered = config.to_toml().unwrap();
        assert!(rendered.contains("[gate]"));
        assert!(rendered.contains("plugin_dir"));
    }
}
