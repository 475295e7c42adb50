//! Re-checks needs-rebase for every open PR targeting a branch after a push.
//!
//! GitHub resolves mergeability asynchronously, so each PR is polled until
//! the flag settles or a per-PR timeout expires. Rapid consecutive pushes to
//! the same branch coalesce: one in-flight pass at a time, plus at most one
//! queued re-run. A newer push never cancels a running pass.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::github::gateway::RepositoryGateway;
use crate::github::types::Mergeable;
use crate::github::PrLocks;
use crate::reconcile::labels::LabelReconciler;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Delay between consecutive mergeable polls for one PR.
    pub poll_interval: Duration,
    /// Bounds polling per PR, not per batch; one slow PR cannot starve the
    /// rest because PRs poll concurrently.
    pub poll_timeout: Duration,
}

impl SchedulerConfig {
    pub fn new(poll_interval: Duration, poll_timeout: Duration) -> Self {
        Self {
            poll_interval,
            poll_timeout,
        }
    }
}

#[derive(Default)]
struct BranchState {
    running: bool,
    /// Single-slot: only "a newer push arrived" matters, not how many.
    pending: bool,
}

pub struct PushDebounceScheduler {
    gateway: Arc<dyn RepositoryGateway>,
    locks: Arc<PrLocks>,
    config: SchedulerConfig,
    branches: Mutex<HashMap<String, BranchState>>,
}

impl PushDebounceScheduler {
    pub fn new(
        gateway: Arc<dyn RepositoryGateway>,
        locks: Arc<PrLocks>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            gateway,
            locks,
            config,
            branches: Mutex::new(HashMap::new()),
        }
    }

    /// Entry point for push events. Schedules a re-check pass for the base
    /// branch, or marks the running pass for one re-run.
    pub fn on_push(self: &Arc<Self>, base_branch: &str) {
        {
            let mut branches = self.branches.lock().unwrap();
            let state = branches.entry(base_branch.to_string()).or_default();
            if state.running {
                state.pending = true;
                debug!("Push to '{}' coalesced into running pass", base_branch);
                return;
            }
            state.running = true;
        }

        let scheduler = Arc::clone(self);
        let branch = base_branch.to_string();
        tokio::spawn(async move {
            loop {
                if let Err(e) = scheduler.run_pass(&branch).await {
                    warn!("Mergeable re-check pass for '{}' failed: {}", branch, e);
                }

                let mut branches = scheduler.branches.lock().unwrap();
                let state = branches
                    .get_mut(&branch)
                    .expect("branch state exists while running");
                if state.pending {
                    state.pending = false;
                    // A push arrived during the pass: go around once more.
                } else {
                    state.running = false;
                    break;
                }
            }
        });
    }

    /// True while a pass for the branch is running or queued.
    pub fn is_busy(&self, base_branch: &str) -> bool {
        let branches = self.branches.lock().unwrap();
        branches
            .get(base_branch)
            .map(|s| s.running || s.pending)
            .unwrap_or(false)
    }

    /// Test and shutdown aid: wait for the branch worker to drain.
    pub async fn wait_until_idle(&self, base_branch: &str) {
        while self.is_busy(base_branch) {
            sleep(Duration::from_millis(5)).await;
        }
    }

    async fn run_pass(&self, base_branch: &str) -> Result<()> {
        let open = self.gateway.open_pull_requests(base_branch).await?;
        info!(
            "Re-checking mergeable state of {} open PRs against '{}'",
            open.len(),
            base_branch
        );

        let mut tasks = JoinSet::new();
        for pr in open {
            let gateway = Arc::clone(&self.gateway);
            let locks = Arc::clone(&self.locks);
            let config = self.config.clone();
            tasks.spawn(async move {
                let resolved =
                    poll_mergeable(gateway.as_ref(), pr.number, &config).await;
                match resolved {
                    Ok(Mergeable::Unknown) => {
                        // Still unresolved at timeout; the next push or
                        // periodic pass will retry.
                        debug!("PR #{} mergeable still unknown; skipping", pr.number);
                    }
                    Ok(state) => {
                        let plan = LabelReconciler::plan_rebase(state, &pr.labels);
                        if plan.is_empty() {
                            return;
                        }
                        let lock = locks.lock_for(pr.number).await;
                        let _guard = lock.lock().await;
                        let mut ensured = HashSet::new();
                        if let Err(e) =
                            LabelReconciler::apply(gateway.as_ref(), pr.number, &plan, &mut ensured)
                                .await
                        {
                            warn!("Label reconciliation failed for PR #{}: {}", pr.number, e);
                        }
                    }
                    Err(e) => {
                        warn!("Mergeable polling failed for PR #{}: {}", pr.number, e);
                    }
                }
            });
        }

        while tasks.join_next().await.is_some() {}

        Ok(())
    }
}

async fn poll_mergeable(
    gateway: &dyn RepositoryGateway,
    pr_number: u64,
    config: &SchedulerConfig,
) -> Result<Mergeable> {
    let deadline = Instant::now() + config.poll_timeout;

    loop {
        let state = gateway.mergeable_state(pr_number).await?;
        if state != Mergeable::Unknown {
            return Ok(state);
        }
        if Instant::now() + config.poll_interval > deadline {
            return Ok(Mergeable::Unknown);
        }
        sleep(config.poll_interval).await;
    }
}
