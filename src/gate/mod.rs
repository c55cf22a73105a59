//! The commit gate
//!
//! Drives one run through
//!
//! ```text
//! Idle → ListingFiles → Materializing → Checking → Aggregating → Done
//!             │               │             │
//!             └───────────────┴─────────────┴──────────────────→ Aborted
//! ```
//!
//! Every staged file is materialized into a private workspace before any
//! plugin runs, then every (file, plugin) pair is checked on a bounded pool.
//! The workspace is torn down before [`CommitGate::run`] returns, whatever
//! the outcome.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{GateConfig, GateSettings};
use crate::error::GateError;
use crate::git::{ChangedFile, StagedSource};
use crate::interrupt::Interrupt;
use crate::mime::MimeSniffer;
use crate::parallel::ExecutionStrategy;
use crate::plugins::{
    CheckRequest, InvocationMode, PluginInvoker, PluginOutcome, PluginSet, Verdict,
};
use crate::process::RunLimits;
use crate::workspace::{MaterializeError, Workspace};

pub mod report;

pub use report::{FileReport, GateOutcome, RunResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Idle,
    ListingFiles,
    Materializing,
    Checking,
    Aggregating,
    Done,
    Aborted,
}

fn transition(state: &mut GateState, next: GateState) {
    debug!(from = ?*state, to = ?next, "Gate state transition");
    *state = next;
}

pub struct CommitGate<S> {
    source: S,
    plugins: PluginSet,
    invoker: Arc<PluginInvoker>,
    sniffer: MimeSniffer,
    settings: GateSettings,
    interrupt: Interrupt,
    temp_root: Option<PathBuf>,
}

impl<S: StagedSource> CommitGate<S> {
    /// `cwd` is the working directory plugins run in
    pub fn new(
        source: S,
        plugins: PluginSet,
        config: &GateConfig,
        cwd: Option<PathBuf>,
        interrupt: Interrupt,
    ) -> Self {
        let limits = RunLimits {
            timeout: config.timeout(),
            max_output_bytes: config.gate.max_output_bytes,
            interrupt: interrupt.clone(),
        };
        Self {
            source,
            plugins,
            invoker: Arc::new(PluginInvoker::new(limits, cwd)),
            sniffer: MimeSniffer::new(config.gate.mime_command.clone(), interrupt.clone()),
            settings: config.gate.clone(),
            interrupt,
            temp_root: None,
        }
    }

    /// Create workspaces under `root` instead of the system temp dir
    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(root.into());
        self
    }

    /// Run the gate once and decide.
    ///
    /// Only a failed listing or an unusable workspace is an error; anything
    /// scoped to one file or one plugin ends up in the [`RunResult`].
    pub async fn run(&self) -> Result<GateOutcome, GateError> {
        let mut state = GateState::Idle;

        transition(&mut state, GateState::ListingFiles);
        let files = match self.source.list_changed_files().await {
            Ok(files) => files,
            Err(err) => {
                transition(&mut state, GateState::Aborted);
                return Err(err.into());
            }
        };
        info!(
            files = files.len(),
            plugins = self.plugins.len(),
            "Checking staged files"
        );

        let workspace = match &self.temp_root {
            Some(root) => Workspace::create_in(root),
            None => Workspace::create(),
        };
        let workspace = match workspace {
            Ok(workspace) => workspace,
            Err(err) => {
                transition(&mut state, GateState::Aborted);
                return Err(err.into());
            }
        };

        let result = self.check_all(&workspace, &files, &mut state).await;
        if let Err(err) = workspace.destroy() {
            warn!(error = %err, "Temporary workspace was not fully removed");
        }

        let result = match result {
            Ok(result) => result,
            Err(err) => {
                transition(&mut state, GateState::Aborted);
                return Err(err);
            }
        };

        let outcome = GateOutcome::decide(result);
        let terminal = match outcome {
            GateOutcome::Aborted(_) => GateState::Aborted,
            _ => GateState::Done,
        };
        transition(&mut state, terminal);
        Ok(outcome)
    }

    async fn check_all(
        &self,
        workspace: &Workspace,
        files: &[ChangedFile],
        state: &mut GateState,
    ) -> Result<RunResult, GateError> {
        transition(state, GateState::Materializing);
        let mut reports: Vec<FileReport> = Vec::with_capacity(files.len());
        let mut targets: Vec<(usize, CheckRequest)> = Vec::new();
        let mut interrupted = false;

        for file in files {
            if self.interrupt.is_triggered() {
                interrupted = true;
                break;
            }
            match workspace.materialize(file, &self.source).await {
                Ok(temp_path) => {
                    let mime_type = self.sniffer.sniff(&temp_path).await;
                    debug!(file = %file, mime = %mime_type, "File ready for checking");
                    targets.push((
                        reports.len(),
                        CheckRequest {
                            real_path: file.path().to_path_buf(),
                            temp_path,
                            mime_type: mime_type.clone(),
                        },
                    ));
                    reports.push(FileReport::checked(file, mime_type));
                }
                Err(MaterializeError::Vcs(err)) => {
                    warn!(file = %file, error = %err, "Could not read staged content, skipping file");
                    reports.push(FileReport::unreadable(file, err.to_string()));
                }
                Err(MaterializeError::Workspace(err)) => return Err(err.into()),
            }
        }

        if !interrupted {
            transition(state, GateState::Checking);
            interrupted = self.check_targets(targets, &mut reports).await;
        }

        transition(state, GateState::Aggregating);
        Ok(RunResult {
            files: reports,
            plugin_count: self.plugins.len(),
            interrupted,
            workspace_root: workspace.root().to_path_buf(),
        })
    }

    /// Invoke every plugin on every target; returns whether the run was cut short
    async fn check_targets(
        &self,
        targets: Vec<(usize, CheckRequest)>,
        reports: &mut [FileReport],
    ) -> bool {
        let plugin_count = self.plugins.len();
        let work: Vec<(usize, usize, CheckRequest)> = targets
            .into_iter()
            .flat_map(|(report, request)| {
                (0..plugin_count).map(move |plugin| (report, plugin, request.clone()))
            })
            .collect();
        let keys: Vec<(usize, usize)> = work.iter().map(|(r, p, _)| (*r, *p)).collect();

        let strategy = ExecutionStrategy::from_settings(&self.settings, work.len());
        debug!(?strategy, pairs = work.len(), "Invoking plugins");

        let invoker = Arc::clone(&self.invoker);
        let plugins = self.plugins.clone();
        let outcomes = strategy
            .execute(work, &self.interrupt, move |(_, index, request)| {
                let invoker = Arc::clone(&invoker);
                let plugin = Arc::clone(&plugins[index]);
                async move {
                    invoker
                        .invoke(plugin.as_ref(), &InvocationMode::Check(request))
                        .await
                }
            })
            .await;

        let mut interrupted = self.interrupt.is_triggered();
        for ((report, plugin), outcome) in keys.into_iter().zip(outcomes) {
            match outcome {
                Some(outcome) => reports[report].outcomes.push(outcome),
                None if self.interrupt.is_triggered() => interrupted = true,
                None => reports[report].outcomes.push(PluginOutcome {
                    plugin: self.plugins[plugin].name().to_string(),
                    verdict: Verdict::Error,
                    output: "plugin invocation did not complete".to_string(),
                    elapsed: std::time::Duration::ZERO,
                }),
            }
        }
        interrupted
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::error::VcsQueryError;
    use crate::git::memory::MemorySource;
    use crate::plugins::PluginRegistry;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use tempfile::TempDir;

    struct Fixture {
        plugin_dir: TempDir,
        temp_root: TempDir,
        config: GateConfig,
    }

    impl Fixture {
        fn new() -> Self {
            let mut config = GateConfig::default();
            config.gate.timeout_secs = 10;
            config.gate.mime_command = vec![
                "sh".to_string(),
                "-c".to_string(),
                "echo text/plain".to_string(),
                "sh".to_string(),
            ];
            Self {
                plugin_dir: TempDir::new().unwrap(),
                temp_root: TempDir::new().unwrap(),
                config,
            }
        }

        fn plugin(&self, name: &str, body: &str) -> &Self {
            let path = self.plugin_dir.path().join(name);
            fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            self
        }

        fn gate(&self, source: MemorySource) -> CommitGate<MemorySource> {
            let plugins = PluginRegistry::new(self.plugin_dir.path()).load(&self.config);
            CommitGate::new(source, plugins, &self.config, None, Interrupt::never())
                .with_temp_root(self.temp_root.path())
        }

        fn temp_root_is_empty(&self) -> bool {
            fs::read_dir(self.temp_root.path()).unwrap().next().is_none()
        }
    }

    fn no_tabs() -> &'static str {
        "[ \"$1\" = check ] || exit 0\nif grep -q \"$(printf '\\t')\" \"$3\"; then echo \"$2 contains tabs\"; exit 10; fi\nexit 0"
    }

    #[tokio::test]
    async fn test_clean_files_are_accepted() {
        let fixture = Fixture::new();
        fixture.plugin("no-tabs", no_tabs());

        let outcome = fixture
            .gate(MemorySource::default().with("a.py", "x = 1\n"))
            .run()
            .await
            .unwrap();

        assert!(outcome.is_accepted());
        let result = outcome.result();
        assert_eq!(result.files.len(), 1);
        assert_eq!(result.files[0].outcomes.len(), 1);
        assert!(!result.workspace_root().exists());
        assert!(fixture.temp_root_is_empty());
    }

    #[tokio::test]
    async fn test_veto_rejects_and_names_offender() {
        let fixture = Fixture::new();
        fixture.plugin("no-tabs", no_tabs());
        fixture.plugin("always-ok", "exit 0");

        let outcome = fixture
            .gate(
                MemorySource::default()
                    .with("good.py", "x = 1\n")
                    .with("bad.py", "if x:\n\tpass\n"),
            )
            .run()
            .await
            .unwrap();

        let GateOutcome::Rejected(result) = &outcome else {
            panic!("expected rejection, got {outcome:?}");
        };
        assert_eq!(result.bad_file_count(), 1);
        assert_eq!(result.offending_pairs(), vec![(Path::new("bad.py"), "no-tabs")]);
        let veto = result.files[1].vetoes().next().unwrap();
        assert!(veto.output.contains("bad.py contains tabs"));
        assert!(fixture.temp_root_is_empty());
    }

    #[tokio::test]
    async fn test_malfunction_is_reported_but_accepted() {
        let fixture = Fixture::new();
        fixture.plugin("broken", "echo boom >&2; exit 3");

        let outcome = fixture
            .gate(MemorySource::default().with("a.txt", "hello\n"))
            .run()
            .await
            .unwrap();

        assert!(outcome.is_accepted());
        assert_eq!(outcome.result().malfunction_count(), 1);
        let error = outcome.result().files[0].malfunctions().next().unwrap();
        assert!(error.output.contains("boom"));
    }

    #[tokio::test]
    async fn test_plugins_see_contract_arguments() {
        let fixture = Fixture::new();
        fixture.plugin(
            "echo-args",
            "echo \"mode=$1 real=$2 mime=$4\"; cat \"$3\"; exit 10",
        );

        let outcome = fixture
            .gate(MemorySource::default().with("dir/file.txt", "staged bytes\n"))
            .run()
            .await
            .unwrap();

        let output = &outcome.result().files[0].outcomes[0].output;
        assert!(output.contains("mode=check real=dir/file.txt mime=text/plain"));
        assert!(output.contains("staged bytes"));
    }

    #[tokio::test]
    async fn test_unreadable_file_is_recorded_and_not_checked() {
        let fixture = Fixture::new();
        fixture.plugin("always-veto", "exit 10");

        let outcome = fixture
            .gate(
                MemorySource::default()
                    .unreadable("vanished.txt")
                    .with("kept.txt", "x\n"),
            )
            .run()
            .await
            .unwrap();

        let result = outcome.result();
        assert!(result.files[0].materialize_error.is_some());
        assert!(result.files[0].outcomes.is_empty());
        assert_eq!(result.files[1].outcomes.len(), 1);
        assert_eq!(result.offending_pairs(), vec![(Path::new("kept.txt"), "always-veto")]);
    }

    #[tokio::test]
    async fn test_listing_failure_creates_no_workspace() {
        let fixture = Fixture::new();
        fixture.plugin("always-ok", "exit 0");

        let source = MemorySource {
            list_error: Some(VcsQueryError::Failed {
                command: "git diff-index".to_string(),
                status: 128,
                stderr: "fatal: bad revision 'HEAD'".to_string(),
            }),
            ..MemorySource::default()
        };
        let err = fixture.gate(source).run().await.unwrap_err();

        assert!(matches!(err, GateError::Vcs(_)));
        assert!(fixture.temp_root_is_empty());
    }

    #[tokio::test]
    async fn test_sequential_and_parallel_agree() {
        let source = || {
            MemorySource::default()
                .with("a.py", "\tx\n")
                .with("b.py", "y\n")
                .with("c.py", "\tz\n")
        };

        let mut verdicts = Vec::new();
        for max_workers in [1, 4] {
            let mut fixture = Fixture::new();
            fixture.config.gate.max_workers = max_workers;
            fixture.config.gate.thread_percentage = 100;
            fixture.plugin("no-tabs", no_tabs());
            fixture.plugin("zz-ok", "exit 0");

            let outcome = fixture.gate(source()).run().await.unwrap();
            let summary: Vec<Vec<Verdict>> = outcome
                .result()
                .files
                .iter()
                .map(|f| f.outcomes.iter().map(|o| o.verdict).collect())
                .collect();
            verdicts.push(summary);
        }

        assert_eq!(verdicts[0], verdicts[1]);
        assert_eq!(
            verdicts[0],
            vec![
                vec![Verdict::Veto, Verdict::Ok],
                vec![Verdict::Ok, Verdict::Ok],
                vec![Verdict::Veto, Verdict::Ok],
            ]
        );
    }

    #[tokio::test]
    async fn test_interrupt_aborts_and_cleans_up() {
        let fixture = Fixture::new();
        fixture.plugin("slow", "sleep 30; exit 0");

        let (trigger, interrupt) = crate::interrupt::channel();
        let plugins = PluginRegistry::new(fixture.plugin_dir.path()).load(&fixture.config);
        let gate = CommitGate::new(
            MemorySource::default().with("a.txt", "x\n"),
            plugins,
            &fixture.config,
            None,
            interrupt,
        )
        .with_temp_root(fixture.temp_root.path());

        let run = gate.run();
        tokio::pin!(run);
        let outcome = tokio::select! {
            outcome = &mut run => outcome,
            _ = tokio::time::sleep(std::time::Duration::from_millis(300)) => {
                trigger.trigger();
                tokio::time::timeout(std::time::Duration::from_secs(5), run)
                    .await
                    .expect("interrupted gate returns promptly")
            }
        }
        .unwrap();

        assert!(matches!(outcome, GateOutcome::Aborted(_)));
        assert!(fixture.temp_root_is_empty());
    }
}
