use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error};

use crate::config::GateSettings;
use crate::interrupt::Interrupt;

/// Execution strategy enum for choosing between parallel and sequential
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStrategy {
    Sequential,
    Parallel { workers: usize },
}

impl ExecutionStrategy {
    /// Parallel only when there is more than one item and more than one worker
    pub fn auto(work_items_count: usize, optimal_workers: usize) -> Self {
        let workers = optimal_workers.min(work_items_count);
        if workers > 1 {
            ExecutionStrategy::Parallel { workers }
        } else {
            ExecutionStrategy::Sequential
        }
    }

    /// Strategy for `work_items_count` items under the configured limits
    pub fn from_settings(settings: &GateSettings, work_items_count: usize) -> Self {
        let optimal =
            Self::calculate_optimal_workers(settings.max_workers, settings.thread_percentage);
        Self::auto(work_items_count, optimal)
    }

    /// Calculate optimal workers from available cores and configuration
    ///
    /// ```text
    /// 1. Detect available CPU cores: num_cpus::get()
    /// 2. Apply percentage: cores * thread_percentage / 100
    /// 3. Apply config limit: min(max_threads_config, percentage_result) if max_threads_config > 0
    /// 4. Ensure minimum: max(1, final_result)
    /// ```
    pub fn calculate_optimal_workers(max_threads_config: usize, thread_percentage: u8) -> usize {
        let available_cores = num_cpus::get();
        let by_percentage = (available_cores * usize::from(thread_percentage.min(100))) / 100;

        let workers = if max_threads_config > 0 {
            max_threads_config.min(by_percentage.max(1))
        } else {
            by_percentage
        };

        workers.max(1)
    }

    pub fn workers(&self) -> usize {
        match self {
            ExecutionStrategy::Sequential => 1,
            ExecutionStrategy::Parallel { workers } => *workers,
        }
    }

    /// Run `processor` over every item with at most `workers()` in flight.
    ///
    /// Slot `i` of the result holds the output for item `i`, or `None` when
    /// the item never started (interrupt) or its task panicked.
    pub async fn execute<T, R, F, Fut>(
        &self,
        work_items: Vec<T>,
        interrupt: &Interrupt,
        processor: F,
    ) -> Vec<Option<R>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut,
        Fut: Future<Output = R> + Send + 'static,
    {
        let total = work_items.len();
        let mut results: Vec<Option<R>> = std::iter::repeat_with(|| None).take(total).collect();
        if total == 0 {
            return results;
        }

        debug!(strategy = ?self, items = total, "Executing work items");

        let permits = Arc::new(Semaphore::new(self.workers()));
        let mut tasks = JoinSet::new();

        for (index, item) in work_items.into_iter().enumerate() {
            if interrupt.is_triggered() {
                break;
            }
            let permit = tokio::select! {
                permit = Arc::clone(&permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
                _ = interrupt.triggered() => break,
            };

            let work = processor(item);
            tasks.spawn(async move {
                let _permit = permit;
                (index, work.await)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(err) => error!(error = %err, "Worker task failed"),
            }
        }

        results
    }
}
