//! Per-run results and the decision derived from them.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::git::ChangedFile;
use crate::plugins::{PluginOutcome, Verdict};

/// Everything the gate learned about one changed file
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    /// Type hint handed to the plugins; absent when the file was not materialized
    pub mime_type: Option<String>,
    /// Why the staged content could not be read
    pub materialize_error: Option<String>,
    /// One entry per plugin that ran, in plugin order
    pub outcomes: Vec<PluginOutcome>,
}

impl FileReport {
    pub(crate) fn checked(file: &ChangedFile, mime_type: String) -> Self {
        Self {
            path: file.path().to_path_buf(),
            mime_type: Some(mime_type),
            materialize_error: None,
            outcomes: Vec::new(),
        }
    }

    pub(crate) fn unreadable(file: &ChangedFile, error: String) -> Self {
        Self {
            path: file.path().to_path_buf(),
            mime_type: None,
            materialize_error: Some(error),
            outcomes: Vec::new(),
        }
    }

    /// A file is bad iff some plugin vetoed it
    pub fn is_bad(&self) -> bool {
        self.outcomes.iter().any(|o| o.verdict == Verdict::Veto)
    }

    pub fn vetoes(&self) -> impl Iterator<Item = &PluginOutcome> {
        self.outcomes.iter().filter(|o| o.verdict == Verdict::Veto)
    }

    pub fn malfunctions(&self) -> impl Iterator<Item = &PluginOutcome> {
        self.outcomes.iter().filter(|o| o.verdict == Verdict::Error)
    }

    /// Output of accepting plugins that still had something to say
    pub fn notes(&self) -> impl Iterator<Item = &PluginOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.verdict == Verdict::Ok && !o.output.trim().is_empty())
    }
}

/// Outcome of one gate run
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    /// In the order the VCS listed the files
    pub files: Vec<FileReport>,
    pub plugin_count: usize,
    /// Set when an interrupt cut the run short
    pub interrupted: bool,
    #[serde(skip)]
    pub workspace_root: PathBuf,
}

impl RunResult {
    pub fn bad_files(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|f| f.is_bad())
    }

    pub fn bad_file_count(&self) -> usize {
        self.bad_files().count()
    }

    pub fn malfunction_count(&self) -> usize {
        self.files.iter().map(|f| f.malfunctions().count()).sum()
    }

    /// `(path, plugin)` for every veto
    pub fn offending_pairs(&self) -> Vec<(&Path, &str)> {
        self.files
            .iter()
            .flat_map(|file| {
                file.vetoes()
                    .map(move |outcome| (file.path.as_path(), outcome.plugin.as_str()))
            })
            .collect()
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }
}

/// The commit decision
#[derive(Debug, Clone)]
pub enum GateOutcome {
    Accepted(RunResult),
    Rejected(RunResult),
    Aborted(RunResult),
}

impl GateOutcome {
    pub(crate) fn decide(result: RunResult) -> Self {
        if result.interrupted {
            GateOutcome::Aborted(result)
        } else if result.bad_file_count() > 0 {
            GateOutcome::Rejected(result)
        } else {
            GateOutcome::Accepted(result)
        }
    }

    pub fn result(&self) -> &RunResult {
        match self {
            GateOutcome::Accepted(result)
            | GateOutcome::Rejected(result)
            | GateOutcome::Aborted(result) => result,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, GateOutcome::Accepted(_))
    }
}
