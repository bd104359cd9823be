//! Workflow service implementation
//!
//! The worker-facing gRPC surface: context streaming, the frozen action
//! list, and status reporting. Handlers translate engine errors into the
//! gRPC status codes workers are written against.

use crate::convert;
use ingot_engine::{
    action_list, current_context, is_applicable, ActionReport, Clock, ReportError, ReportHandler,
    Store, StoreError,
};
use ingot_proto::workflow as pb;
use ingot_proto::WorkflowService;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status};
use tracing::{debug, info, warn};

/// WorkflowService gRPC implementation
pub struct WorkflowServiceImpl {
    store: Arc<dyn Store>,
    reporter: ReportHandler,
}

impl WorkflowServiceImpl {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self {
            reporter: ReportHandler::new(store.clone(), clock),
            store,
        }
    }
}

fn store_status(err: StoreError) -> Status {
    match err {
        StoreError::NotFound(what) => Status::not_found(what),
        other => Status::aborted(other.to_string()),
    }
}

fn report_status(err: ReportError) -> Status {
    match err {
        ReportError::InvalidArgument(msg) => Status::invalid_argument(msg),
        ReportError::FailedPrecondition(msg) => Status::failed_precondition(msg),
        ReportError::NotFound(what) => Status::not_found(what),
        ReportError::RetriesExhausted(_) => Status::aborted(err.to_string()),
        ReportError::Store(inner) => Status::aborted(inner.to_string()),
    }
}

#[tonic::async_trait]
impl WorkflowService for WorkflowServiceImpl {
    type GetWorkflowContextsStream = ReceiverStream<Result<pb::WorkflowContext, Status>>;

    async fn get_workflow_contexts(
        &self,
        request: Request<pb::WorkflowContextRequest>,
    ) -> Result<Response<Self::GetWorkflowContextsStream>, Status> {
        let worker_id = request.into_inner().worker_id;
        if worker_id.is_empty() {
            return Err(Status::invalid_argument("invalid worker id"));
        }

        let workflows = self
            .store
            .list_workflows_for_worker(&worker_id)
            .await
            .map_err(store_status)?;
        info!(
            worker = %worker_id,
            count = workflows.len(),
            "found workflows for worker"
        );

        let (tx, rx) = mpsc::channel(16);
        let store = self.store.clone();
        tokio::spawn(async move {
            for wf in workflows {
                let name = wf.metadata.name;
                // Re-fetch for a consistent per-workflow snapshot
                let wf = match store.get_workflow(&name).await {
                    Ok(wf) => wf,
                    Err(e) => {
                        // Skip this workflow; the stream carries on
                        warn!(workflow = %name, error = %e, "could not load workflow context");
                        continue;
                    }
                };
                let Some(pos) = current_context(&wf) else {
                    continue;
                };
                let actions = action_list(&wf);
                if is_applicable(&pos, &worker_id, &actions) {
                    debug!(workflow = %name, worker = %worker_id, "send workflow context");
                    if tx.send(Ok(convert::position_to_proto(&pos))).await.is_err() {
                        // Client cancelled; stop streaming
                        return;
                    }
                }
            }
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }

    async fn get_workflow_context(
        &self,
        request: Request<pb::GetRequest>,
    ) -> Result<Response<pb::WorkflowContext>, Status> {
        let id = request.into_inner().id;
        if id.is_empty() {
            return Err(Status::invalid_argument("invalid workflow id"));
        }
        let wf = self.store.get_workflow(&id).await.map_err(store_status)?;
        let pos = current_context(&wf).ok_or_else(|| {
            Status::failed_precondition(format!("workflow {} is not materialized", id))
        })?;
        Ok(Response::new(convert::position_to_proto(&pos)))
    }

    async fn get_workflow_actions(
        &self,
        request: Request<pb::WorkflowActionsRequest>,
    ) -> Result<Response<pb::WorkflowActionList>, Status> {
        let id = request.into_inner().workflow_id;
        if id.is_empty() {
            return Err(Status::invalid_argument("invalid workflow id"));
        }
        let wf = self.store.get_workflow(&id).await.map_err(store_status)?;
        Ok(Response::new(convert::action_list_to_proto(&action_list(
            &wf,
        ))))
    }

    async fn report_action_status(
        &self,
        request: Request<pb::WorkflowActionStatus>,
    ) -> Result<Response<pb::Empty>, Status> {
        let req = request.into_inner();
        let status = pb::State::try_from(req.action_status)
            .map_err(|_| Status::invalid_argument("invalid action status"))?;

        let report = ActionReport {
            workflow_id: req.workflow_id,
            task_name: req.task_name,
            action_name: req.action_name,
            action_status: convert::state_from_proto(status),
            worker_id: req.worker_id,
            message: req.message,
        };

        self.reporter.report(&report).await.map_err(report_status)?;
        Ok(Response::new(pb::Empty {}))
    }

    async fn update_workflow_data(
        &self,
        request: Request<pb::UpdateWorkflowDataRequest>,
    ) -> Result<Response<pb::Empty>, Status> {
        // Wire-compat stub; ephemeral workflow data carries no engine
        // semantics
        let req = request.into_inner();
        if req.workflow_id.is_empty() {
            return Err(Status::invalid_argument("invalid workflow id"));
        }
        Ok(Response::new(pb::Empty {}))
    }

    async fn get_workflow_data(
        &self,
        request: Request<pb::GetWorkflowDataRequest>,
    ) -> Result<Response<pb::GetWorkflowDataResponse>, Status> {
        let req = request.into_inner();
        if req.workflow_id.is_empty() {
            return Err(Status::invalid_argument("invalid workflow id"));
        }
        Ok(Response::new(pb::GetWorkflowDataResponse {
            data: b"{}".to_vec(),
            version: 0,
        }))
    }
}
