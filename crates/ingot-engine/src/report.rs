//! Worker status reports
//!
//! Validates a report against the workflow's current dispatch context,
//! advances the per-action state machine, and persists the result through
//! the conditional status patch. A patch conflict means another writer got
//! there first; the whole sequence is retried from a fresh load so every
//! attempt recomputes its target state.

use crate::clock::Clock;
use crate::context::{action_list, current_context, locate};
use crate::store::{Store, StoreError};
use ingot_crd::{State, Workflow};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Bounded retry budget for patch conflicts
const MAX_PATCH_ATTEMPTS: usize = 5;

/// A worker-submitted action status report
#[derive(Debug, Clone)]
pub struct ActionReport {
    pub workflow_id: String,
    pub task_name: String,
    pub action_name: String,
    pub action_status: State,
    pub worker_id: String,
    pub message: String,
}

/// Errors from report handling
#[derive(Debug, Error)]
pub enum ReportError {
    /// Missing or mismatched identifiers in the report
    #[error("{0}")]
    InvalidArgument(String),

    /// The reported transition is illegal for the action's current state
    #[error("{0}")]
    FailedPrecondition(String),

    /// Unknown workflow
    #[error("workflow not found: {0}")]
    NotFound(String),

    /// The retry budget was exhausted on patch conflicts
    #[error("status patch conflicted after {0} attempts")]
    RetriesExhausted(usize),

    /// Store fault
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ReportError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => ReportError::NotFound(what),
            other => ReportError::Store(other),
        }
    }
}

/// Result type for report handling
pub type Result<T> = std::result::Result<T, ReportError>;

/// Applies worker status reports to persisted workflows
pub struct ReportHandler {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl ReportHandler {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Validate and apply one report.
    pub async fn report(&self, report: &ActionReport) -> Result<()> {
        if report.workflow_id.is_empty() {
            return Err(ReportError::InvalidArgument(
                "invalid workflow id".to_string(),
            ));
        }
        if report.task_name.is_empty() {
            return Err(ReportError::InvalidArgument("invalid task name".to_string()));
        }
        if report.action_name.is_empty() {
            return Err(ReportError::InvalidArgument(
                "invalid action name".to_string(),
            ));
        }

        debug!(
            workflow = %report.workflow_id,
            action = %report.action_name,
            status = %report.action_status,
            worker = %report.worker_id,
            "received action status"
        );

        for attempt in 1..=MAX_PATCH_ATTEMPTS {
            let stored = self.store.get_workflow(&report.workflow_id).await?;
            let mut wf = stored.clone();

            let pos = current_context(&wf).ok_or_else(|| {
                ReportError::FailedPrecondition(format!(
                    "workflow {} has no compiled actions",
                    report.workflow_id
                ))
            })?;
            let actions = action_list(&wf);
            let idx = pos.current_action_index;
            let action = &actions[idx as usize];

            if action.task_name != report.task_name {
                return Err(ReportError::InvalidArgument(
                    "reported task name does not match the current action details".to_string(),
                ));
            }
            if action.name != report.action_name {
                return Err(ReportError::InvalidArgument(format!(
                    "reported action name does not match the current action details. Got {} expected {}",
                    report.action_name, action.name
                )));
            }

            apply_report(&mut wf, idx, report, self.clock.as_ref())?;

            match self.store.patch_workflow_status(&wf, &stored).await {
                Ok(()) => return Ok(()),
                Err(StoreError::Conflict(reason)) => {
                    warn!(
                        workflow = %report.workflow_id,
                        attempt,
                        %reason,
                        "status patch conflicted, retrying"
                    );
                }
                Err(other) => return Err(other.into()),
            }
        }

        Err(ReportError::RetriesExhausted(MAX_PATCH_ATTEMPTS))
    }
}

/// Advance the action at the given linear index and propagate to the
/// workflow state. Pure given the clock; every legality rule lives here.
fn apply_report(wf: &mut Workflow, index: i64, report: &ActionReport, clock: &dyn Clock) -> Result<()> {
    let total = wf
        .status
        .tasks
        .iter()
        .map(|t| t.actions.len() as i64)
        .sum::<i64>();
    let (ti, ai) = locate(wf, index).ok_or_else(|| {
        ReportError::FailedPrecondition(format!("action index {} out of range", index))
    })?;
    let now = clock.now();
    let current = wf.status.tasks[ti].actions[ai].status;

    match report.action_status {
        State::StateRunning if current == State::StatePending => {
            let action = &mut wf.status.tasks[ti].actions[ai];
            action.status = State::StateRunning;
            action.started_at = Some(now);
            if wf.status.state == Some(State::StatePending) {
                wf.status.state = Some(State::StateRunning);
                wf.status.started_at = Some(now);
            }
        }
        State::StateSuccess if current == State::StateRunning => {
            let action = &mut wf.status.tasks[ti].actions[ai];
            action.status = State::StateSuccess;
            action.seconds = action
                .started_at
                .map(|started| (now - started).num_seconds())
                .unwrap_or(0);
            if index + 1 == total {
                wf.status.state = Some(State::StateSuccess);
            }
        }
        terminal @ (State::StateFailed | State::StateTimeout) if !current.is_terminal() => {
            let action = &mut wf.status.tasks[ti].actions[ai];
            action.status = terminal;
            action.seconds = action
                .started_at
                .map(|started| (now - started).num_seconds())
                .unwrap_or(0);
            action.message = report.message.clone();
            wf.status.state = Some(terminal);
        }
        State::StatePending => {
            return Err(ReportError::InvalidArgument("no update requested".to_string()));
        }
        requested => {
            return Err(ReportError::FailedPrecondition(format!(
                "illegal transition from {} to {}",
                current, requested
            )));
        }
    }
    Ok(())
}
