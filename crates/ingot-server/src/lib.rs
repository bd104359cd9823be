//! Ingot workflow service
//!
//! Hosts the worker-facing gRPC service and the reconciler as one process.
//! Both honor the process-wide shutdown channel: the server stops accepting
//! requests and in-flight streams end; the reconciler finishes its pass and
//! exits.

pub mod convert;
pub mod grpc;

pub use grpc::WorkflowServiceImpl;

use ingot_engine::{Clock, Reconciler, Store};
use ingot_proto::WorkflowServiceServer;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Serve the workflow service and run the reconciler until shutdown.
pub async fn serve(
    addr: SocketAddr,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    shutdown: watch::Receiver<()>,
) -> anyhow::Result<()> {
    let reconciler = Reconciler::new(store.clone(), clock.clone());
    let reconciler_handle = tokio::spawn(reconciler.run(shutdown.clone()));

    let service = WorkflowServiceImpl::new(store, clock);
    info!(%addr, "starting workflow service");

    let mut signal = shutdown.clone();
    tonic::transport::Server::builder()
        .add_service(WorkflowServiceServer::new(service))
        .serve_with_shutdown(addr, async move {
            let _ = signal.changed().await;
        })
        .await?;

    // The reconciler exits on the same signal; don't leave it behind if
    // the server stopped for another reason
    reconciler_handle.abort();
    let _ = reconciler_handle.await;

    info!("workflow service stopped");
    Ok(())
}
