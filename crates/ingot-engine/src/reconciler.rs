//! Workflow reconciler
//!
//! Drives every workflow toward a terminal state from two event sources:
//! store-observed mutations (periodic listing) and wall-clock timeouts.
//! Newly created workflows are materialized exactly once: the referenced
//! template is rendered against the hardware binding and the compiled plan
//! is written into the status. Running workflows are swept for expired
//! global and per-action timeouts.

use crate::clock::Clock;
use crate::render::{render, RenderError};
use crate::store::{Store, StoreError};
use ingot_crd::{State, Workflow};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info};

/// Cap on the requeue delay
pub const MAX_REQUEUE_DELAY: Duration = Duration::from_secs(30);

/// Floor on the sweep interval so an expired deadline cannot busy-loop
const MIN_SWEEP_DELAY: Duration = Duration::from_secs(1);

/// Errors from a reconcile pass
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("template render failed: {0}")]
    Render(#[from] RenderError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for reconciliation
pub type Result<T> = std::result::Result<T, ReconcileError>;

/// Materializes new workflows and enforces timeouts
pub struct Reconciler {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// One pass over one workflow. Returns the requeue delay, or `None`
    /// for a terminal workflow.
    pub async fn reconcile(&self, name: &str) -> Result<Option<Duration>> {
        let stored = self.store.get_workflow(name).await?;
        if stored.metadata.deletion_timestamp.is_some() {
            // Finalization belongs to an external collaborator
            return Ok(None);
        }
        let mut wf = stored.clone();

        match wf.status.state {
            None => self.materialize(&mut wf).await?,
            Some(State::StateRunning) => self.sweep_timeouts(&mut wf),
            _ => {}
        }

        if wf != stored {
            match self.store.patch_workflow_status(&wf, &stored).await {
                Ok(()) => {}
                Err(StoreError::Conflict(reason)) => {
                    // Not an error: another writer advanced the workflow
                    debug!(workflow = %name, %reason, "patch conflicted, requeueing");
                    return Ok(Some(MIN_SWEEP_DELAY));
                }
                Err(other) => return Err(other.into()),
            }
        }

        Ok(self.requeue_after(&wf))
    }

    /// Compile the referenced template into this workflow's status.
    ///
    /// Every mapped device must resolve to exactly one hardware record
    /// before any state is written; an unknown or ambiguous MAC aborts
    /// materialization.
    async fn materialize(&self, wf: &mut Workflow) -> Result<()> {
        for (label, addr) in &wf.spec.hardware_map {
            self.store.get_hardware_by_mac(addr).await.map_err(|e| {
                error!(
                    workflow = %wf.metadata.name,
                    device = %label,
                    mac = %addr,
                    error = %e,
                    "hardware binding does not resolve"
                );
                e
            })?;
        }

        let template = self.store.get_template(&wf.spec.template_ref).await?;
        let text = template.spec.data.as_deref().unwrap_or_default();
        let (compiled, rendered) =
            render(text, &wf.metadata.name, &wf.spec.hardware_map)?;

        wf.status.tasks = compiled.tasks;
        wf.status.global_timeout = compiled.global_timeout;
        wf.status.data = rendered;
        wf.status.state = Some(State::StatePending);

        info!(
            workflow = %wf.metadata.name,
            template = %wf.spec.template_ref,
            tasks = wf.status.tasks.len(),
            "materialized workflow"
        );
        Ok(())
    }

    /// Expire the global deadline and any overdue running actions.
    fn sweep_timeouts(&self, wf: &mut Workflow) {
        let now = self.clock.now();

        if let Some(started) = wf.status.started_at {
            let deadline = started + chrono::Duration::seconds(wf.status.global_timeout);
            if now > deadline {
                info!(workflow = %wf.metadata.name, "global timeout expired");
                wf.status.state = Some(State::StateTimeout);
                return;
            }
        }

        for task in &mut wf.status.tasks {
            for action in &mut task.actions {
                if action.status != State::StateRunning {
                    continue;
                }
                let Some(started) = action.started_at else {
                    continue;
                };
                if now > started + chrono::Duration::seconds(action.timeout) {
                    info!(
                        workflow = %wf.metadata.name,
                        task = %task.name,
                        action = %action.name,
                        "action timed out"
                    );
                    action.status = State::StateTimeout;
                    action.message = "Action timed out".to_string();
                    action.seconds = (now - started).num_seconds();
                    wf.status.state = Some(State::StateTimeout);
                }
            }
        }
    }

    /// The requeue delay: minimum remaining time among the global deadline
    /// and the running actions' deadlines, capped at [`MAX_REQUEUE_DELAY`].
    fn requeue_after(&self, wf: &Workflow) -> Option<Duration> {
        if wf.is_terminal() {
            return None;
        }

        let now = self.clock.now();
        let mut delay = MAX_REQUEUE_DELAY;

        let mut consider = |deadline: chrono::DateTime<chrono::Utc>| {
            let remaining = (deadline - now).num_seconds().max(0) as u64;
            delay = delay.min(Duration::from_secs(remaining));
        };

        if let Some(started) = wf.status.started_at {
            consider(started + chrono::Duration::seconds(wf.status.global_timeout));
        }
        for task in &wf.status.tasks {
            for action in &task.actions {
                if action.status == State::StateRunning {
                    if let Some(started) = action.started_at {
                        consider(started + chrono::Duration::seconds(action.timeout));
                    }
                }
            }
        }

        Some(delay)
    }

    /// Reconcile everything once; returns the delay until the next pass.
    pub async fn reconcile_all(&self) -> Duration {
        let workflows = match self.store.list_workflows().await {
            Ok(workflows) => workflows,
            Err(e) => {
                error!(error = %e, "listing workflows failed");
                return MAX_REQUEUE_DELAY;
            }
        };

        let mut next = MAX_REQUEUE_DELAY;
        for wf in workflows {
            match self.reconcile(&wf.metadata.name).await {
                Ok(Some(delay)) => next = next.min(delay),
                Ok(None) => {}
                Err(e) => {
                    // Logged and retried on the next pass; a render error
                    // persists until the template is fixed or the workflow
                    // is deleted
                    error!(workflow = %wf.metadata.name, error = %e, "reconcile failed");
                }
            }
        }
        next.max(MIN_SWEEP_DELAY)
    }

    /// Run the reconcile loop until shutdown is signalled.
    pub async fn run(self, mut shutdown: watch::Receiver<()>) {
        info!("reconciler started");
        loop {
            let delay = self.reconcile_all().await;
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => {
                    info!("reconciler shutting down");
                    return;
                }
            }
        }
    }
}
