//! In-memory store
//!
//! Reference `Store` implementation and the test backend. Each collection
//! lives behind its own `RwLock`; the worker index is computed under the
//! workflow lock, so it is linearizable with status writes. Version tokens
//! are monotonically increasing counters rendered as strings.

use crate::store::{Result, Store, StoreError};
use async_trait::async_trait;
use ingot_crd::{Hardware, Template, Workflow};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use uuid::Uuid;

/// In-memory storage backend
#[derive(Debug, Default)]
pub struct MemoryStore {
    workflows: RwLock<HashMap<String, Workflow>>,
    templates: RwLock<HashMap<String, Template>>,
    hardware: RwLock<HashMap<String, Hardware>>,
    version: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_version(&self) -> String {
        self.version.fetch_add(1, Ordering::SeqCst).to_string()
    }

    fn find_hardware<F>(&self, kind: &'static str, key: &str, matches: F) -> Result<Hardware>
    where
        F: Fn(&Hardware) -> bool,
    {
        let hardware = self.hardware.read().unwrap();
        let mut found: Vec<&Hardware> = hardware.values().filter(|hw| matches(hw)).collect();
        found.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));

        match found.len() {
            0 => Err(StoreError::NotFound(format!("{} {}", kind, key))),
            1 => Ok(found[0].clone()),
            _ => Err(StoreError::Ambiguous {
                kind,
                key: key.to_string(),
                names: found.iter().map(|hw| hw.metadata.name.clone()).collect(),
            }),
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_workflow(&self, name: &str) -> Result<Workflow> {
        self.workflows
            .read()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("workflow {}", name)))
    }

    async fn list_workflows(&self) -> Result<Vec<Workflow>> {
        let mut all: Vec<Workflow> = self.workflows.read().unwrap().values().cloned().collect();
        all.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
        Ok(all)
    }

    async fn list_workflows_for_worker(&self, worker_addr: &str) -> Result<Vec<Workflow>> {
        let workflows = self.workflows.read().unwrap();
        let mut found: Vec<Workflow> = workflows
            .values()
            .filter(|wf| {
                wf.status
                    .tasks
                    .iter()
                    .any(|task| task.worker_addr == worker_addr)
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
        Ok(found)
    }

    async fn create_workflow(&self, wf: &Workflow) -> Result<()> {
        let mut workflows = self.workflows.write().unwrap();
        if workflows.contains_key(&wf.metadata.name) {
            return Err(StoreError::AlreadyExists(format!(
                "workflow {}",
                wf.metadata.name
            )));
        }
        let mut wf = wf.clone();
        if wf.metadata.uid.is_none() {
            wf.metadata.uid = Some(Uuid::new_v4());
        }
        wf.metadata.resource_version = Some(self.next_version());
        workflows.insert(wf.metadata.name.clone(), wf);
        Ok(())
    }

    async fn patch_workflow_status(&self, new: &Workflow, base: &Workflow) -> Result<()> {
        let mut workflows = self.workflows.write().unwrap();
        let stored = workflows
            .get_mut(&base.metadata.name)
            .ok_or_else(|| StoreError::NotFound(format!("workflow {}", base.metadata.name)))?;

        if stored.metadata.resource_version != base.metadata.resource_version {
            return Err(StoreError::Conflict(format!(
                "workflow {} version changed",
                base.metadata.name
            )));
        }

        stored.status = new.status.clone();
        stored.metadata.resource_version = Some(self.next_version());
        Ok(())
    }

    async fn delete_workflow(&self, name: &str) -> Result<()> {
        self.workflows
            .write()
            .unwrap()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("workflow {}", name)))
    }

    async fn get_template(&self, name: &str) -> Result<Template> {
        self.templates
            .read()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("template {}", name)))
    }

    async fn put_template(&self, template: &Template) -> Result<()> {
        self.templates
            .write()
            .unwrap()
            .insert(template.metadata.name.clone(), template.clone());
        Ok(())
    }

    async fn get_hardware_by_mac(&self, mac: &str) -> Result<Hardware> {
        self.find_hardware("hardware mac", mac, |hw| {
            hw.macs().any(|m| m.eq_ignore_ascii_case(mac))
        })
    }

    async fn get_hardware_by_ip(&self, ip: &str) -> Result<Hardware> {
        self.find_hardware("hardware ip", ip, |hw| hw.ips().any(|i| i == ip))
    }

    async fn get_hardware_by_id(&self, id: &Uuid) -> Result<Hardware> {
        self.find_hardware("hardware id", &id.to_string(), |hw| {
            hw.metadata.uid.as_ref() == Some(id)
        })
    }

    async fn put_hardware(&self, hw: &Hardware) -> Result<()> {
        let mut hw = hw.clone();
        if hw.metadata.uid.is_none() {
            hw.metadata.uid = Some(Uuid::new_v4());
        }
        self.hardware
            .write()
            .unwrap()
            .insert(hw.metadata.name.clone(), hw.clone());
        Ok(())
    }
}
