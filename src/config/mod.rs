//! Configuration management for stagegate
//!
//! The typed [`GateConfig`] is what the orchestrator receives; nothing in the
//! gate reads global state. Loading and layering live in [`core`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

mod core;

pub use self::core::{ENV_PREFIX, REPO_CONFIG_FILE};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Verbose per-plugin tracing
    pub debug: bool,

    /// Hook installation settings
    pub hook: HookSettings,

    /// Orchestrator settings
    pub gate: GateSettings,

    /// Per-plugin enable switches keyed by plugin name
    pub plugins: BTreeMap<String, bool>,

    /// Built-in checkers wrapping third-party tools
    pub checkers: Vec<CheckerConfig>,
}

/// Where the hook lives and how a hook-triggered run is recognised
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HookSettings {
    /// File name under `<git dir>/hooks`
    pub name: String,

    /// Source-of-truth copy, relative to the working tree
    pub source_path: PathBuf,

    /// Environment variable set by git when running hooks
    pub env_marker: String,
}

/// Orchestrator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateSettings {
    /// Plugin directory, relative to the working tree unless absolute
    pub plugin_dir: PathBuf,

    /// Per-invocation deadline in seconds
    pub timeout_secs: u64,

    /// Worker limit (0 = derive from CPU count)
    pub max_workers: usize,

    /// Percentage of CPU cores to use when `max_workers` is 0
    pub thread_percentage: u8,

    /// Cap on captured plugin output
    pub max_output_bytes: usize,

    /// Type-sniffing command; the file path is appended
    pub mime_command: Vec<String>,
}

/// A configured checker: one or more tool steps run against matching files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckerConfig {
    pub name: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// File extensions without the leading dot
    #[serde(default)]
    pub extensions: Vec<String>,

    #[serde(default)]
    pub mime_types: Vec<String>,

    pub steps: Vec<StepConfig>,
}

/// A single tool invocation inside a checker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    pub kind: StepKind,

    /// Program and arguments; `{path}`, `{temp}` and `{mime}` are substituted
    pub command: Vec<String>,

    /// Style findings veto the commit unless this is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocking: Option<bool>,

    /// Output lines containing any of these are dropped from diagnostics
    #[serde(default)]
    pub ignore_output: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    /// Failure always vetoes
    Syntax,
    /// Failure vetoes only when blocking
    Style,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Syntax => "syntax",
            StepKind::Style => "style",
        }
    }
}

fn default_enabled() -> bool {
    true
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            debug: false,
            hook: HookSettings::default(),
            gate: GateSettings::default(),
            plugins: BTreeMap::new(),
            checkers: Vec::new(),
        }
    }
}

impl Default for HookSettings {
    fn default() -> Self {
        Self {
            name: "pre-commit".to_string(),
            source_path: PathBuf::from("pre-commit"),
            env_marker: "GIT_INDEX_FILE".to_string(),
        }
    }
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            plugin_dir: PathBuf::from("pre-commit-plugins"),
            timeout_secs: 60,
            max_workers: 0,
            thread_percentage: 75,
            max_output_bytes: 1024 * 1024,
            mime_command: vec![
                "file".to_string(),
                "--brief".to_string(),
                "--mime-type".to_string(),
            ],
        }
    }
}

impl GateConfig {
    /// Per-invocation timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.gate.timeout_secs.max(1))
    }

    /// Plugins are enabled unless switched off by name
    pub fn is_plugin_enabled(&self, name: &str) -> bool {
        self.plugins.get(name).copied().unwrap_or(true)
    }

    pub fn plugin_dir(&self, workdir: &Path) -> PathBuf {
        resolve(workdir, &self.gate.plugin_dir)
    }

    pub fn hook_source_path(&self, workdir: &Path) -> PathBuf {
        resolve(workdir, &self.hook.source_path)
    }

    /// An explicit `plugins.<name>` switch wins over the checker's own
    /// `enabled` flag
    pub fn is_checker_active(&self, checker: &CheckerConfig) -> bool {
        self.plugins
            .get(&checker.name)
            .copied()
            .unwrap_or(checker.enabled)
    }

    pub fn active_checkers(&self) -> impl Iterator<Item = &CheckerConfig> {
        self.checkers
            .iter()
            .filter(|checker| self.is_checker_active(checker))
    }
}

impl GateConfig {
    /// Problems that make the configuration unusable, one message each
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.hook.name.is_empty() || self.hook.name.contains('/') {
            problems.push(format!("hook.name must be a plain file name, got {:?}", self.hook.name));
        }
        if self.hook.env_marker.is_empty() {
            problems.push("hook.env_marker must not be empty".to_string());
        }
        if self.gate.timeout_secs == 0 {
            problems.push("gate.timeout_secs must be at least 1".to_string());
        }
        if !(1..=100).contains(&self.gate.thread_percentage) {
            problems.push(format!(
                "gate.thread_percentage must be between 1 and 100, got {}",
                self.gate.thread_percentage
            ));
        }
        if self.gate.max_output_bytes == 0 {
            problems.push("gate.max_output_bytes must be positive".to_string());
        }
        if self.gate.mime_command.is_empty() {
            problems.push("gate.mime_command must name a program".to_string());
        }

        let mut seen = std::collections::BTreeSet::new();
        for checker in &self.checkers {
            if !seen.insert(checker.name.as_str()) {
                problems.push(format!("checker {:?} is defined twice", checker.name));
            }
            if checker.steps.is_empty() {
                problems.push(format!("checker {:?} has no steps", checker.name));
            }
            for (index, step) in checker.steps.iter().enumerate() {
                if step.command.is_empty() {
                    problems.push(format!(
                        "checker {:?} step {} has an empty command",
                        checker.name,
                        index + 1
                    ));
                }
            }
        }

        problems
    }
}

impl StepConfig {
    pub fn is_blocking(&self) -> bool {
        match self.kind {
            StepKind::Syntax => true,
            StepKind::Style => self.blocking.unwrap_or(true),
        }
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugins_enabled_unless_disabled() {
        let mut config = GateConfig::default();
        config.plugins.insert("check-ruby".to_string(), false);

        assert!(config.is_plugin_enabled("check-python"));
        assert!(!config.is_plugin_enabled("check-ruby"));
    }

    #[test]
    fn test_plugin_switch_overrides_checker_flag() {
        let checker = |name: &str, enabled: bool| CheckerConfig {
            name: name.to_string(),
            enabled,
            extensions: vec![],
            mime_types: vec![],
            steps: vec![],
        };
        let mut config = GateConfig::default();
        config.checkers = vec![
            checker("python", false),
            checker("ruby", true),
            checker("puppet", false),
        ];
        config.plugins.insert("python".to_string(), true);
        config.plugins.insert("ruby".to_string(), false);

        let active: Vec<&str> = config.active_checkers().map(|c| c.name.as_str()).collect();
        assert_eq!(active, vec!["python"]);
    }

    #[test]
    fn test_syntax_steps_always_block() {
        let step = StepConfig {
            kind: StepKind::Syntax,
            command: vec!["ruby".to_string(), "-c".to_string()],
            blocking: Some(false),
            ignore_output: vec![],
        };
        assert!(step.is_blocking());

        let style = StepConfig {
            kind: StepKind::Style,
            blocking: Some(false),
            ..step.clone()
        };
        assert!(!style.is_blocking());

        let default_style = StepConfig {
            kind: StepKind::Style,
            blocking: None,
            ..step
        };
        assert!(default_style.is_blocking());
    }

    #[test]
    fn test_relative_paths_resolve_against_workdir() {
        let config = GateConfig::default();
        let workdir = Path::new("/repo");
        assert_eq!(
            config.plugin_dir(workdir),
            PathBuf::from("/repo/pre-commit-plugins")
        );

        let mut absolute = GateConfig::default();
        absolute.gate.plugin_dir = PathBuf::from("/opt/plugins");
        assert_eq!(absolute.plugin_dir(workdir), PathBuf::from("/opt/plugins"));
    }

    #[test]
    fn test_defaults_validate() {
        assert!(GateConfig::default().validate().is_empty());
    }

    #[test]
    fn test_validate_reports_each_problem() {
        let mut config = GateConfig::default();
        config.hook.name = "../pre-commit".to_string();
        config.gate.thread_percentage = 0;
        config.checkers.push(CheckerConfig {
            name: "empty".to_string(),
            enabled: true,
            extensions: vec![],
            mime_types: vec![],
            steps: vec![StepConfig {
                kind: StepKind::Style,
                command: vec![],
                blocking: None,
                ignore_output: vec![],
            }],
        });

        let problems = config.validate();
        assert_eq!(problems.len(), 3, "{problems:?}");
        assert!(problems.iter().any(|p| p.contains("hook.name")));
        assert!(problems.iter().any(|p| p.contains("thread_percentage")));
        assert!(problems.iter().any(|p| p.contains("empty command")));
    }

    #[test]
    fn test_timeout_never_zero() {
        let mut config = GateConfig::default();
        config.gate.timeout_secs = 0;
        assert_eq!(config.timeout(), Duration::from_secs(1));
    }
}
