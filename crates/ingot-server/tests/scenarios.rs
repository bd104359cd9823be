//! End-to-end scenarios against the in-process workflow service:
//! materialization, dispatch, reporting, handoff, timeouts, and conflicts.

use ingot_crd::{Hardware, HardwareSpec, State, Template, Workflow};
use ingot_engine::{FixedClock, MemoryStore, Reconciler, Store, StoreError};
use ingot_proto::workflow as pb;
use ingot_proto::WorkflowService;
use ingot_server::WorkflowServiceImpl;
use std::sync::Arc;
use tokio_stream::StreamExt;
use tonic::Request;

const MAC_A: &str = "3c:ec:ef:4c:4f:54";
const MAC_B: &str = "08:00:27:9e:f5:3a";

const SINGLE_ACTION_TEMPLATE: &str = r#"
version: "0.1"
global_timeout: 600
tasks:
  - name: "provision"
    worker: "{{ device_1 }}"
    actions:
      - name: "stream"
        image: quay.io/example/image2disk:v1.0.0
        timeout: 300
"#;

const TWO_TASK_TEMPLATE: &str = r#"
version: "0.1"
global_timeout: 600
tasks:
  - name: "disk setup"
    worker: "{{ device_1 }}"
    actions:
      - name: "stream"
        image: quay.io/example/image2disk:v1.0.0
        timeout: 300
  - name: "boot"
    worker: "{{ device_2 }}"
    actions:
      - name: "kexec"
        image: quay.io/example/kexec:v1.0.0
        timeout: 90
"#;

struct Harness {
    store: Arc<MemoryStore>,
    clock: Arc<FixedClock>,
    reconciler: Reconciler,
    service: WorkflowServiceImpl,
}

impl Harness {
    async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::at_unix(1637361793));
        Self {
            reconciler: Reconciler::new(store.clone(), clock.clone()),
            service: WorkflowServiceImpl::new(store.clone(), clock.clone()),
            store,
            clock,
        }
    }

    async fn seed_single_action(&self) {
        self.store
            .put_hardware(&Hardware::new("machine1", HardwareSpec::new(MAC_A)))
            .await
            .unwrap();
        self.store
            .put_template(&Template::new("debian", SINGLE_ACTION_TEMPLATE))
            .await
            .unwrap();
        self.store
            .create_workflow(
                &Workflow::new("debian", "debian").with_hardware_map("device_1", MAC_A),
            )
            .await
            .unwrap();
    }

    async fn seed_two_tasks(&self) {
        self.store
            .put_hardware(&Hardware::new("machine1", HardwareSpec::new(MAC_A)))
            .await
            .unwrap();
        self.store
            .put_hardware(&Hardware::new("machine2", HardwareSpec::new(MAC_B)))
            .await
            .unwrap();
        self.store
            .put_template(&Template::new("debian", TWO_TASK_TEMPLATE))
            .await
            .unwrap();
        self.store
            .create_workflow(
                &Workflow::new("debian", "debian")
                    .with_hardware_map("device_1", MAC_A)
                    .with_hardware_map("device_2", MAC_B),
            )
            .await
            .unwrap();
    }

    async fn contexts_for(&self, worker: &str) -> Vec<pb::WorkflowContext> {
        let response = self
            .service
            .get_workflow_contexts(Request::new(pb::WorkflowContextRequest {
                worker_id: worker.to_string(),
            }))
            .await
            .unwrap();
        let mut stream = response.into_inner();
        let mut contexts = Vec::new();
        while let Some(ctx) = stream.next().await {
            contexts.push(ctx.unwrap());
        }
        contexts
    }

    async fn report(
        &self,
        worker: &str,
        task: &str,
        action: &str,
        status: pb::State,
    ) -> Result<(), tonic::Status> {
        self.service
            .report_action_status(Request::new(pb::WorkflowActionStatus {
                workflow_id: "debian".to_string(),
                task_name: task.to_string(),
                action_name: action.to_string(),
                action_status: status as i32,
                seconds: 0,
                message: String::new(),
                worker_id: worker.to_string(),
            }))
            .await
            .map(|_| ())
    }
}

// Happy path: one task, one action, one worker, start to finish.
#[tokio::test]
async fn scenario_happy_path_single_action() {
    let h = Harness::new().await;
    h.seed_single_action().await;

    // Materialization
    h.reconciler.reconcile("debian").await.unwrap();
    let wf = h.store.get_workflow("debian").await.unwrap();
    assert_eq!(wf.status.state, Some(State::StatePending));
    assert_eq!(wf.status.tasks[0].actions[0].status, State::StatePending);

    // The bound worker receives the context
    let contexts = h.contexts_for(MAC_A).await;
    assert_eq!(contexts.len(), 1);
    let ctx = &contexts[0];
    assert_eq!(ctx.current_action, "stream");
    assert_eq!(ctx.current_action_index, 0);
    assert_eq!(ctx.current_action_state(), pb::State::Pending);
    assert_eq!(ctx.total_number_of_actions, 1);

    // RUNNING report starts the workflow clock
    h.report(MAC_A, "provision", "stream", pb::State::Running)
        .await
        .unwrap();
    let wf = h.store.get_workflow("debian").await.unwrap();
    assert_eq!(wf.status.state, Some(State::StateRunning));
    assert!(wf.status.started_at.is_some());
    assert!(wf.status.tasks[0].actions[0].started_at.is_some());

    // SUCCESS report completes the workflow and records elapsed time
    h.clock.advance(chrono::Duration::seconds(42));
    h.report(MAC_A, "provision", "stream", pb::State::Success)
        .await
        .unwrap();
    let wf = h.store.get_workflow("debian").await.unwrap();
    assert_eq!(wf.status.state, Some(State::StateSuccess));
    assert_eq!(wf.status.tasks[0].actions[0].seconds, 42);

    // Nothing further to dispatch
    assert!(h.contexts_for(MAC_A).await.is_empty());
}

// A report naming an unknown action is rejected and changes nothing.
#[tokio::test]
async fn scenario_unknown_action_report() {
    let h = Harness::new().await;
    h.seed_single_action().await;
    h.reconciler.reconcile("debian").await.unwrap();
    assert_eq!(h.contexts_for(MAC_A).await.len(), 1);

    let err = h
        .report(MAC_A, "provision", "notreal", pb::State::Running)
        .await
        .unwrap_err();
    assert_eq!(err.code(), tonic::Code::InvalidArgument);
    assert!(err.message().contains("reported action name does not match"));

    let wf = h.store.get_workflow("debian").await.unwrap();
    assert_eq!(wf.status.state, Some(State::StatePending));
    assert_eq!(wf.status.tasks[0].actions[0].status, State::StatePending);
}

// A running action past its timeout is expired by the reconciler sweep.
#[tokio::test]
async fn scenario_per_action_timeout() {
    let h = Harness::new().await;
    h.store
        .put_hardware(&Hardware::new("machine1", HardwareSpec::new(MAC_A)))
        .await
        .unwrap();
    h.store
        .put_template(&Template::new(
            "debian",
            r#"
global_timeout: 600
tasks:
  - name: "provision"
    worker: "{{ device_1 }}"
    actions:
      - name: "stream"
        image: quay.io/example/image2disk:v1.0.0
        timeout: 30
"#,
        ))
        .await
        .unwrap();
    h.store
        .create_workflow(&Workflow::new("debian", "debian").with_hardware_map("device_1", MAC_A))
        .await
        .unwrap();

    h.reconciler.reconcile("debian").await.unwrap();
    h.report(MAC_A, "provision", "stream", pb::State::Running)
        .await
        .unwrap();

    h.clock.advance(chrono::Duration::seconds(31));
    h.reconciler.reconcile("debian").await.unwrap();

    let wf = h.store.get_workflow("debian").await.unwrap();
    let action = &wf.status.tasks[0].actions[0];
    assert_eq!(action.status, State::StateTimeout);
    assert_eq!(action.seconds, 31);
    assert_eq!(action.message, "Action timed out");
    assert_eq!(wf.status.state, Some(State::StateTimeout));

    // A timed-out workflow is not dispatched again
    assert!(h.contexts_for(MAC_A).await.is_empty());
}

// Two tasks on two workers: the second worker picks up after the first
// worker's final success, and the first worker sees nothing more.
#[tokio::test]
async fn scenario_two_task_handoff() {
    let h = Harness::new().await;
    h.seed_two_tasks().await;
    h.reconciler.reconcile("debian").await.unwrap();

    // Before the handoff only the first worker is addressed
    assert_eq!(h.contexts_for(MAC_A).await.len(), 1);
    assert!(h.contexts_for(MAC_B).await.is_empty());

    h.report(MAC_A, "disk setup", "stream", pb::State::Running)
        .await
        .unwrap();
    h.report(MAC_A, "disk setup", "stream", pb::State::Success)
        .await
        .unwrap();

    // Handoff: nothing for the finished worker, the boot task's worker
    // receives the next context
    assert!(h.contexts_for(MAC_A).await.is_empty());
    let contexts = h.contexts_for(MAC_B).await;
    assert_eq!(contexts.len(), 1);
    let ctx = &contexts[0];
    assert_eq!(ctx.current_task, "boot");
    assert_eq!(ctx.current_action, "kexec");
    assert_eq!(ctx.current_action_index, 1);
    assert_eq!(ctx.current_action_state(), pb::State::Pending);
    assert_eq!(ctx.current_worker, MAC_B);
}

// Two concurrent reporters race the same transition; exactly one wins.
#[tokio::test]
async fn scenario_concurrent_running_reports() {
    let h = Harness::new().await;
    h.seed_single_action().await;
    h.reconciler.reconcile("debian").await.unwrap();

    let (first, second) = tokio::join!(
        h.report(MAC_A, "provision", "stream", pb::State::Running),
        h.report(MAC_A, "provision", "stream", pb::State::Running),
    );

    let outcomes = [first, second];
    let wins = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1, "exactly one reporter must win: {outcomes:?}");

    let loss = outcomes.iter().find(|r| r.is_err()).unwrap();
    let code = loss.as_ref().unwrap_err().code();
    assert!(
        code == tonic::Code::FailedPrecondition || code == tonic::Code::Aborted,
        "loser got {code:?}"
    );

    let wf = h.store.get_workflow("debian").await.unwrap();
    assert_eq!(wf.status.state, Some(State::StateRunning));
}

// Two hardware records sharing a MAC make the binding ambiguous; the
// workflow never materializes and the conflict names both records.
#[tokio::test]
async fn scenario_ambiguous_hardware() {
    let h = Harness::new().await;
    h.seed_single_action().await;
    h.store
        .put_hardware(&Hardware::new("machine2", HardwareSpec::new(MAC_A)))
        .await
        .unwrap();

    let err = h.reconciler.reconcile("debian").await.unwrap_err();
    match err {
        ingot_engine::ReconcileError::Store(StoreError::Ambiguous { names, .. }) => {
            assert_eq!(names, vec!["machine1".to_string(), "machine2".to_string()]);
        }
        other => panic!("expected ambiguous hardware, got {other:?}"),
    }

    assert!(!h.store.get_workflow("debian").await.unwrap().is_materialized());
    assert!(h.contexts_for(MAC_A).await.is_empty());
}
