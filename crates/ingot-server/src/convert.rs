//! Conversions between engine types and their wire form

use ingot_crd::State;
use ingot_engine::{WorkflowAction, WorkflowPosition};
use ingot_proto::workflow as pb;

pub fn state_to_proto(state: State) -> pb::State {
    match state {
        State::StatePending => pb::State::Pending,
        State::StateRunning => pb::State::Running,
        State::StateFailed => pb::State::Failed,
        State::StateTimeout => pb::State::Timeout,
        State::StateSuccess => pb::State::Success,
    }
}

pub fn state_from_proto(state: pb::State) -> State {
    match state {
        pb::State::Pending => State::StatePending,
        pb::State::Running => State::StateRunning,
        pb::State::Failed => State::StateFailed,
        pb::State::Timeout => State::StateTimeout,
        pb::State::Success => State::StateSuccess,
    }
}

pub fn position_to_proto(pos: &WorkflowPosition) -> pb::WorkflowContext {
    pb::WorkflowContext {
        workflow_id: pos.workflow_id.clone(),
        current_worker: pos.current_worker.clone(),
        current_task: pos.current_task.clone(),
        current_action: pos.current_action.clone(),
        current_action_index: pos.current_action_index,
        current_action_state: state_to_proto(pos.current_action_state) as i32,
        total_number_of_actions: pos.total_number_of_actions,
    }
}

pub fn action_to_proto(action: &WorkflowAction) -> pb::WorkflowAction {
    pb::WorkflowAction {
        task_name: action.task_name.clone(),
        name: action.name.clone(),
        image: action.image.clone(),
        timeout: action.timeout,
        command: action.command.clone(),
        worker_id: action.worker_addr.clone(),
        volumes: action.volumes.clone(),
        environment: action.environment.clone(),
        pid: action.pid.clone(),
    }
}

pub fn action_list_to_proto(actions: &[WorkflowAction]) -> pb::WorkflowActionList {
    pb::WorkflowActionList {
        action_list: actions.iter().map(action_to_proto).collect(),
    }
}

pub fn action_from_proto(action: pb::WorkflowAction) -> WorkflowAction {
    WorkflowAction {
        task_name: action.task_name,
        name: action.name,
        image: action.image,
        timeout: action.timeout,
        command: action.command,
        worker_addr: action.worker_id,
        volumes: action.volumes,
        environment: action.environment,
        pid: action.pid,
    }
}
