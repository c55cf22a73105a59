use std::path::PathBuf;
use std::time::Instant;

use tracing::{debug, warn};

use super::{InvocationMode, InvokeContext, Plugin, PluginOutcome, Verdict};
use crate::error::PluginError;
use crate::process::RunLimits;

/// Runs plugins and turns whatever happened into a [`PluginOutcome`].
///
/// Launch failures, timeouts and crashes never escape as errors: they become
/// an `Error` verdict with a synthesized diagnostic.
#[derive(Debug, Clone)]
pub struct PluginInvoker {
    ctx: InvokeContext,
}

impl PluginInvoker {
    pub fn new(limits: RunLimits, cwd: Option<PathBuf>) -> Self {
        Self {
            ctx: InvokeContext { limits, cwd },
        }
    }

    pub async fn invoke(&self, plugin: &dyn Plugin, mode: &InvocationMode) -> PluginOutcome {
        let start = Instant::now();
        let result = plugin.invoke(mode, &self.ctx).await;
        let elapsed = start.elapsed();

        let (verdict, output) = match result {
            Ok(raw) => {
                let verdict = Verdict::from_exit_code(raw.exit_code);
                if verdict == Verdict::Error {
                    warn!(
                        plugin = plugin.name(),
                        mode = mode.label(),
                        exit_code = ?raw.exit_code,
                        "plugin malfunctioned"
                    );
                }
                (verdict, raw.output)
            }
            Err(err) => {
                if matches!(err, PluginError::Interrupted { .. }) {
                    debug!(plugin = plugin.name(), "plugin interrupted");
                } else {
                    warn!(
                        plugin = plugin.name(),
                        mode = mode.label(),
                        error = %err,
                        "plugin failed"
                    );
                }
                (Verdict::Error, err.to_string())
            }
        };

        debug!(
            plugin = plugin.name(),
            mode = mode.label(),
            %verdict,
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "plugin finished"
        );

        PluginOutcome {
            plugin: plugin.name().to_string(),
            verdict,
            output,
            elapsed,
        }
    }
}
