//! Dispatch context computation
//!
//! Pure functions over a workflow snapshot: where execution currently
//! stands (`current_context`), the frozen flattened action list
//! (`action_list`), and whether a context should be streamed to a given
//! worker (`is_applicable`). Keeping these pure keeps the streaming
//! service free of hidden state and makes the predicate directly testable.

use ingot_crd::{State, Workflow};
use serde::{Deserialize, Serialize};

/// Where execution of a workflow currently stands.
///
/// Anchored at the first action in a non-terminal state; when every action
/// is terminal, at the last action with its terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowPosition {
    pub workflow_id: String,
    pub current_worker: String,
    pub current_task: String,
    pub current_action: String,
    pub current_action_index: i64,
    pub current_action_state: State,
    pub total_number_of_actions: i64,
}

/// One entry of the frozen, flattened action list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowAction {
    pub task_name: String,
    pub name: String,
    pub image: String,
    pub timeout: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    pub worker_addr: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    /// Environment as sorted `KEY=value` entries
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub environment: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pid: String,
}

/// Compute the current dispatch context of a workflow.
///
/// Returns `None` for a workflow whose plan has not been materialized.
pub fn current_context(wf: &Workflow) -> Option<WorkflowPosition> {
    let mut total = 0i64;
    let mut found: Option<(usize, usize, i64)> = None;
    let mut last: Option<(usize, usize, i64)> = None;

    for (ti, task) in wf.status.tasks.iter().enumerate() {
        for (ai, action) in task.actions.iter().enumerate() {
            let idx = total;
            total += 1;
            last = Some((ti, ai, idx));
            if found.is_none() && !action.status.is_terminal() {
                found = Some((ti, ai, idx));
            }
        }
    }

    let (ti, ai, idx) = found.or(last)?;
    let task = &wf.status.tasks[ti];
    let action = &task.actions[ai];

    Some(WorkflowPosition {
        workflow_id: wf.metadata.name.clone(),
        current_worker: task.worker_addr.clone(),
        current_task: task.name.clone(),
        current_action: action.name.clone(),
        current_action_index: idx,
        current_action_state: action.status,
        total_number_of_actions: total,
    })
}

/// Locate the `(taskIndex, actionIndex)` pair of a linear action position.
pub fn locate(wf: &Workflow, index: i64) -> Option<(usize, usize)> {
    let mut linear = 0i64;
    for (ti, task) in wf.status.tasks.iter().enumerate() {
        for (ai, _) in task.actions.iter().enumerate() {
            if linear == index {
                return Some((ti, ai));
            }
            linear += 1;
        }
    }
    None
}

/// The frozen, ordered action list of a workflow, flattened across tasks.
pub fn action_list(wf: &Workflow) -> Vec<WorkflowAction> {
    wf.status
        .tasks
        .iter()
        .flat_map(|task| {
            task.actions.iter().map(move |action| {
                let mut environment: Vec<String> = action
                    .environment
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, v))
                    .collect();
                environment.sort();

                WorkflowAction {
                    task_name: task.name.clone(),
                    name: action.name.clone(),
                    image: action.image.clone(),
                    timeout: action.timeout,
                    command: action.command.clone(),
                    worker_addr: task.worker_addr.clone(),
                    volumes: action.volumes.clone(),
                    environment,
                    pid: action.pid.clone().unwrap_or_default(),
                }
            })
        })
        .collect()
}

/// Decide whether a workflow context should be sent to a worker.
///
/// 1. A context in a failed or timed-out state is never sent.
/// 2. A context in a success state is sent only to the worker of the next
///    linear action, if one exists (the handoff between tasks).
/// 3. Otherwise (pending or running) the context goes to the worker of the
///    current action.
pub fn is_applicable(pos: &WorkflowPosition, worker_id: &str, actions: &[WorkflowAction]) -> bool {
    match pos.current_action_state {
        State::StateFailed | State::StateTimeout => false,
        State::StateSuccess => {
            let next = pos.current_action_index as usize + 1;
            actions
                .get(next)
                .map(|action| action.worker_addr == worker_id)
                .unwrap_or(false)
        }
        State::StatePending | State::StateRunning => actions
            .get(pos.current_action_index as usize)
            .map(|action| action.worker_addr == worker_id)
            .unwrap_or(false),
    }
}
