//! Template rendering and workflow compilation
//!
//! Turns a declarative template plus a hardware binding into a concrete,
//! ordered plan. Rendering happens in two phases: variable substitution
//! over the template text (workflow name and per-device worker addresses),
//! then parsing of the rendered YAML into tasks and actions with the task
//! and action scopes for environment and volumes merged.

use ingot_crd::{Action, State, Task};
use minijinja::{Environment, ErrorKind, UndefinedBehavior};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Errors from template rendering and compilation
#[derive(Debug, Error)]
pub enum RenderError {
    /// Malformed template text (substitution syntax or YAML structure)
    #[error("template syntax error: {0}")]
    Syntax(String),

    /// A referenced device label has no binding
    #[error("unresolved template reference: {0}")]
    Resolve(String),

    /// A structurally valid template that describes an invalid plan
    #[error("invalid template: {0}")]
    Validation(String),
}

/// Result type for rendering
pub type Result<T> = std::result::Result<T, RenderError>;

/// The compiled plan: ordered tasks with merged action scopes
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledWorkflow {
    /// Template version string, if declared
    pub version: String,

    /// Global timeout in seconds; defaults to the sum of action timeouts
    pub global_timeout: i64,

    /// Tasks in declaration order, actions initialized to PENDING
    pub tasks: Vec<Task>,
}

/// On-disk shape of a template body, after substitution
#[derive(Debug, Deserialize)]
struct PlanDoc {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    global_timeout: Option<i64>,
    #[serde(default)]
    tasks: Vec<PlanTask>,
}

#[derive(Debug, Deserialize)]
struct PlanTask {
    name: String,
    worker: String,
    #[serde(default)]
    volumes: Vec<String>,
    #[serde(default)]
    environment: HashMap<String, String>,
    #[serde(default)]
    actions: Vec<PlanAction>,
}

#[derive(Debug, Deserialize)]
struct PlanAction {
    name: String,
    image: String,
    #[serde(default)]
    timeout: i64,
    #[serde(default)]
    command: Vec<String>,
    #[serde(default)]
    pid: Option<String>,
    #[serde(default)]
    environment: HashMap<String, String>,
    #[serde(default)]
    volumes: Vec<String>,
}

/// Render a template and compile it into an ordered plan.
///
/// `hardware_map` maps template-local device labels (e.g. `device_1`) to
/// worker addresses. The rendered text is returned alongside the compiled
/// plan so it can be retained for audit.
pub fn render(
    template_text: &str,
    workflow_name: &str,
    hardware_map: &HashMap<String, String>,
) -> Result<(CompiledWorkflow, String)> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);

    let tmpl = env
        .template_from_str(template_text)
        .map_err(|e| RenderError::Syntax(e.to_string()))?;

    let mut vars: BTreeMap<&str, &str> = BTreeMap::new();
    vars.insert("workflow_name", workflow_name);
    for (label, addr) in hardware_map {
        vars.insert(label, addr);
    }

    let rendered = tmpl.render(&vars).map_err(|e| match e.kind() {
        ErrorKind::UndefinedError => RenderError::Resolve(e.to_string()),
        _ => RenderError::Syntax(e.to_string()),
    })?;

    let doc: PlanDoc =
        serde_yaml::from_str(&rendered).map_err(|e| RenderError::Syntax(e.to_string()))?;

    let compiled = compile(doc, hardware_map)?;
    Ok((compiled, rendered))
}

fn compile(doc: PlanDoc, hardware_map: &HashMap<String, String>) -> Result<CompiledWorkflow> {
    if doc.tasks.is_empty() {
        return Err(RenderError::Validation("template has no tasks".to_string()));
    }
    if doc.global_timeout.map(|t| t < 0).unwrap_or(false) {
        return Err(RenderError::Validation(
            "negative global timeout".to_string(),
        ));
    }

    let mut seen = std::collections::HashSet::new();
    let mut tasks = Vec::with_capacity(doc.tasks.len());
    let mut timeout_sum = 0i64;

    for task in doc.tasks {
        if !seen.insert(task.name.clone()) {
            return Err(RenderError::Validation(format!(
                "duplicate task name: {}",
                task.name
            )));
        }
        if task.actions.is_empty() {
            return Err(RenderError::Validation(format!(
                "task '{}' has no actions",
                task.name
            )));
        }
        // A task worker must resolve to one of the mapped device addresses.
        if !hardware_map.values().any(|addr| addr == &task.worker) {
            return Err(RenderError::Resolve(format!(
                "task '{}' worker '{}' does not match any mapped device",
                task.name, task.worker
            )));
        }

        let mut actions = Vec::with_capacity(task.actions.len());
        for action in task.actions {
            if action.timeout < 0 {
                return Err(RenderError::Validation(format!(
                    "action '{}' has a negative timeout",
                    action.name
                )));
            }
            timeout_sum += action.timeout;

            let mut environment = task.environment.clone();
            environment.extend(action.environment);

            actions.push(Action {
                name: action.name,
                image: action.image,
                timeout: action.timeout,
                command: action.command,
                pid: action.pid,
                environment,
                volumes: merge_volumes(&task.volumes, &action.volumes),
                status: State::StatePending,
                started_at: None,
                seconds: 0,
                message: String::new(),
            });
        }

        tasks.push(Task {
            name: task.name,
            worker_addr: task.worker,
            actions,
            environment: task.environment,
            volumes: task.volumes,
        });
    }

    Ok(CompiledWorkflow {
        version: doc.version.unwrap_or_default(),
        global_timeout: doc.global_timeout.unwrap_or(timeout_sum),
        tasks,
    })
}

/// Merge task-scope and action-scope volume lists.
///
/// A volume entry is `source:mount[:opts]`; entries are keyed by the
/// segment before the first `:` and action scope overrides task scope.
fn merge_volumes(task: &[String], action: &[String]) -> Vec<String> {
    let mut merged: BTreeMap<String, String> = BTreeMap::new();
    for vol in task.iter().chain(action.iter()) {
        match vol.split_once(':') {
            Some((key, rest)) => merged.insert(key.to_string(), rest.to_string()),
            None => merged.insert(vol.clone(), String::new()),
        };
    }
    merged
        .into_iter()
        .map(|(key, rest)| {
            if rest.is_empty() {
                key
            } else {
                format!("{}:{}", key, rest)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_TASK_TEMPLATE: &str = r#"
version: "0.1"
name: {{ workflow_name }}
global_timeout: 1800
tasks:
  - name: "disk setup"
    worker: "{{ device_1 }}"
    volumes:
      - /dev:/dev
      - /statedir:/statedir
    environment:
      MIRROR_HOST: 192.168.1.2
    actions:
      - name: "stream"
        image: quay.io/example/image2disk:v1.0.0
        timeout: 300
        environment:
          IMG_URL: http://192.168.1.2/debian.img
          MIRROR_HOST: 192.168.1.3
        volumes:
          - /statedir:/tmp/statedir
  - name: "boot"
    worker: "{{ device_2 }}"
    actions:
      - name: "kexec"
        image: quay.io/example/kexec:v1.0.0
        timeout: 90
        pid: host
"#;

    fn two_device_map() -> HashMap<String, String> {
        HashMap::from([
            ("device_1".to_string(), "3c:ec:ef:4c:4f:54".to_string()),
            ("device_2".to_string(), "08:00:27:9e:f5:3a".to_string()),
        ])
    }

    #[test]
    fn test_render_two_tasks() {
        let (compiled, rendered) =
            render(TWO_TASK_TEMPLATE, "debian", &two_device_map()).unwrap();

        assert_eq!(compiled.version, "0.1");
        assert_eq!(compiled.global_timeout, 1800);
        assert_eq!(compiled.tasks.len(), 2);

        let disk = &compiled.tasks[0];
        assert_eq!(disk.name, "disk setup");
        assert_eq!(disk.worker_addr, "3c:ec:ef:4c:4f:54");
        assert_eq!(disk.actions.len(), 1);
        assert_eq!(disk.actions[0].status, State::StatePending);

        let boot = &compiled.tasks[1];
        assert_eq!(boot.worker_addr, "08:00:27:9e:f5:3a");
        assert_eq!(boot.actions[0].pid.as_deref(), Some("host"));

        assert!(rendered.contains("name: debian"));
        assert!(rendered.contains("3c:ec:ef:4c:4f:54"));
    }

    #[test]
    fn test_render_merges_environment() {
        let (compiled, _) = render(TWO_TASK_TEMPLATE, "debian", &two_device_map()).unwrap();
        let env = &compiled.tasks[0].actions[0].environment;

        // Action scope overrides task scope by key
        assert_eq!(env.get("MIRROR_HOST"), Some(&"192.168.1.3".to_string()));
        assert_eq!(
            env.get("IMG_URL"),
            Some(&"http://192.168.1.2/debian.img".to_string())
        );
    }

    #[test]
    fn test_render_merges_volumes() {
        let (compiled, _) = render(TWO_TASK_TEMPLATE, "debian", &two_device_map()).unwrap();
        let volumes = &compiled.tasks[0].actions[0].volumes;

        // /statedir remapped by the action, /dev inherited from the task
        assert_eq!(
            volumes,
            &vec!["/dev:/dev".to_string(), "/statedir:/tmp/statedir".to_string()]
        );
    }

    #[test]
    fn test_render_is_deterministic() {
        let a = render(TWO_TASK_TEMPLATE, "debian", &two_device_map()).unwrap();
        let b = render(TWO_TASK_TEMPLATE, "debian", &two_device_map()).unwrap();
        assert_eq!(a.0, b.0);
        assert_eq!(a.1, b.1);
    }

    #[test]
    fn test_render_unresolved_label() {
        let map = HashMap::from([("device_1".to_string(), "aa:bb:cc:dd:ee:ff".to_string())]);
        let err = render(TWO_TASK_TEMPLATE, "debian", &map).unwrap_err();
        assert!(matches!(err, RenderError::Resolve(_)), "got {err:?}");
    }

    #[test]
    fn test_render_empty_hardware_map() {
        let err = render(TWO_TASK_TEMPLATE, "debian", &HashMap::new()).unwrap_err();
        assert!(matches!(err, RenderError::Resolve(_)));
    }

    #[test]
    fn test_render_unmapped_literal_worker() {
        let template = r#"
tasks:
  - name: "t"
    worker: "aa:aa:aa:aa:aa:aa"
    actions:
      - name: "a"
        image: img
        timeout: 10
"#;
        let map = HashMap::from([("device_1".to_string(), "bb:bb:bb:bb:bb:bb".to_string())]);
        let err = render(template, "wf", &map).unwrap_err();
        assert!(matches!(err, RenderError::Resolve(_)));
    }

    #[test]
    fn test_render_bad_substitution_syntax() {
        let err = render("tasks: {{ unclosed", "wf", &HashMap::new()).unwrap_err();
        assert!(matches!(err, RenderError::Syntax(_)));
    }

    #[test]
    fn test_render_bad_yaml() {
        let err = render("tasks:\n  - name: [unbalanced", "wf", &HashMap::new()).unwrap_err();
        assert!(matches!(err, RenderError::Syntax(_)));
    }

    #[test]
    fn test_render_no_tasks() {
        let err = render("version: \"0.1\"\n", "wf", &HashMap::new()).unwrap_err();
        assert!(matches!(err, RenderError::Validation(_)));
    }

    #[test]
    fn test_render_task_without_actions() {
        let template = r#"
tasks:
  - name: "empty"
    worker: "{{ device_1 }}"
    actions: []
"#;
        let map = HashMap::from([("device_1".to_string(), "aa:bb:cc:dd:ee:ff".to_string())]);
        let err = render(template, "wf", &map).unwrap_err();
        assert!(matches!(err, RenderError::Validation(_)));
    }

    #[test]
    fn test_render_duplicate_task_names() {
        let template = r#"
tasks:
  - name: "dup"
    worker: "{{ device_1 }}"
    actions:
      - name: "a"
        image: img
  - name: "dup"
    worker: "{{ device_1 }}"
    actions:
      - name: "b"
        image: img
"#;
        let map = HashMap::from([("device_1".to_string(), "aa:bb:cc:dd:ee:ff".to_string())]);
        let err = render(template, "wf", &map).unwrap_err();
        assert!(matches!(err, RenderError::Validation(_)));
    }

    #[test]
    fn test_render_negative_timeout() {
        let template = r#"
tasks:
  - name: "t"
    worker: "{{ device_1 }}"
    actions:
      - name: "a"
        image: img
        timeout: -5
"#;
        let map = HashMap::from([("device_1".to_string(), "aa:bb:cc:dd:ee:ff".to_string())]);
        let err = render(template, "wf", &map).unwrap_err();
        assert!(matches!(err, RenderError::Validation(_)));
    }

    #[test]
    fn test_global_timeout_defaults_to_action_sum() {
        let template = r#"
tasks:
  - name: "t"
    worker: "{{ device_1 }}"
    actions:
      - name: "a"
        image: img
        timeout: 300
      - name: "b"
        image: img
        timeout: 90
"#;
        let map = HashMap::from([("device_1".to_string(), "aa:bb:cc:dd:ee:ff".to_string())]);
        let (compiled, _) = render(template, "wf", &map).unwrap();
        assert_eq!(compiled.global_timeout, 390);
    }
}
