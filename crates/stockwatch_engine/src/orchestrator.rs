use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use stockwatch_core::TargetConfig;
use stockwatch_logging::{watch_error, watch_info};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::check::CheckRunner;
use crate::{CheckError, CheckOutcome, CheckReport, RunSummary};

pub const DEFAULT_MAX_CONCURRENCY: usize = 5;

/// Runs every target's check concurrently, at most `max_concurrency` at a time.
///
/// Each check is its own task, so a check that panics is reported as failed
/// without disturbing the others. `run_all` returns once every task ended.
pub struct Orchestrator {
    runner: Arc<CheckRunner>,
    max_concurrency: usize,
}

impl Orchestrator {
    pub fn new(runner: CheckRunner, max_concurrency: usize) -> Self {
        Self {
            runner: Arc::new(runner),
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub async fn run_all(&self, targets: Vec<TargetConfig>) -> RunSummary {
        let total = targets.len();
        watch_info!(
            "Checking {} target(s) with up to {} in parallel",
            total,
            self.max_concurrency
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();
        let targets: Vec<Arc<TargetConfig>> = targets.into_iter().map(Arc::new).collect();

        for (index, target) in targets.iter().enumerate() {
            let runner = self.runner.clone();
            let semaphore = semaphore.clone();
            let target = target.clone();
            tasks.spawn(async move {
                // The semaphore is never closed, so acquiring only waits.
                let _permit = semaphore.acquire_owned().await.ok();
                let result = AssertUnwindSafe(runner.run(&target)).catch_unwind().await;
                (index, result)
            });
        }

        let mut slots: Vec<Option<CheckReport>> = vec![None; total];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Ok(report))) => slots[index] = Some(report),
                Ok((index, Err(payload))) => {
                    let target = &targets[index];
                    let reason = panic_message(payload.as_ref());
                    watch_error!(
                        "Check for {} ({}) panicked: {}",
                        target.label,
                        target.page_url,
                        reason
                    );
                    slots[index] = Some(CheckReport::new(
                        target,
                        CheckOutcome::Failed(CheckError::Panicked(reason)),
                    ));
                }
                Err(err) => watch_error!("Check task ended abnormally: {}", err),
            }
        }

        let reports = slots
            .into_iter()
            .zip(&targets)
            .map(|(slot, target)| {
                slot.unwrap_or_else(|| {
                    CheckReport::new(
                        target,
                        CheckOutcome::Failed(CheckError::Panicked("check did not finish".into())),
                    )
                })
            })
            .collect();

        let summary = RunSummary { reports };
        watch_info!(
            "Checked {} target(s): {} found, {} not found, {} failed, {} recipient(s) notified",
            summary.reports.len(),
            summary.found(),
            summary.not_found(),
            summary.failed(),
            summary.notified()
        );
        summary
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
