//! Generated wire types for the Ingot workflow service
//!
//! The protobuf source lives in `proto/workflow.proto`; `tonic-build`
//! generates the message types plus the `WorkflowService` client and
//! server at build time.

pub mod workflow {
    tonic::include_proto!("ingot.workflow");
}

pub use workflow::workflow_service_client::WorkflowServiceClient;
pub use workflow::workflow_service_server::{WorkflowService, WorkflowServiceServer};
