//! Rundown and resource storage.

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::models::{Project, Resource, ResourceId, Rundown};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Rundown not found: {0}")]
    RundownNotFound(String),
    #[error("Group {group_id} not found in rundown {rundown_id}")]
    GroupNotFound { rundown_id: String, group_id: String },
}

/// Single source of truth for project, rundown and resource state.
///
/// The core only writes back state it computed itself.
pub trait RundownStore: Send {
    fn get_project(&self) -> &Project;
    fn update_project(&mut self, project: Project);
    fn get_all_rundowns(&self) -> Vec<&Rundown>;

    fn get_rundown(&self, rundown_id: &str) -> Result<&Rundown, StoreError> {
        self.get_all_rundowns()
            .into_iter()
            .find(|r| r.id == rundown_id)
            .ok_or_else(|| StoreError::RundownNotFound(rundown_id.to_string()))
    }

    fn update_rundown(&mut self, rundown_id: &str, rundown: Rundown) -> Result<(), StoreError>;
    fn get_resources(&self) -> &FxHashMap<ResourceId, Resource>;

    /// Store (`Some`) or delete (`None`) a resource.
    fn update_resource(&mut self, resource_id: &str, resource: Option<Resource>);

    fn resource_ids_for_device(&self, device_id: &str) -> Vec<ResourceId> {
        let mut ids: Vec<ResourceId> = self
            .get_resources()
            .values()
            .filter(|r| r.device_id == device_id)
            .map(|r| r.id.clone())
            .collect();
        ids.sort();
        ids
    }
}

/// In-process store.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    project: Project,
    rundowns: Vec<Rundown>,
    resources: FxHashMap<ResourceId, Resource>,
}

impl MemoryStore {
    pub fn new(project: Project, rundowns: Vec<Rundown>) -> Self {
        Self {
            project,
            rundowns,
            resources: FxHashMap::default(),
        }
    }
}

impl RundownStore for MemoryStore {
    fn get_project(&self) -> &Project {
        &self.project
    }

    fn update_project(&mut self, project: Project) {
        self.project = project;
    }

    fn get_all_rundowns(&self) -> Vec<&Rundown> {
        self.rundowns.iter().collect()
    }

    fn update_rundown(&mut self, rundown_id: &str, rundown: Rundown) -> Result<(), StoreError> {
        let slot = self
            .rundowns
            .iter_mut()
            .find(|r| r.id == rundown_id)
            .ok_or_else(|| StoreError::RundownNotFound(rundown_id.to_string()))?;
        *slot = rundown;
        Ok(())
    }

    fn get_resources(&self) -> &FxHashMap<ResourceId, Resource> {
        &self.resources
    }

    fn update_resource(&mut self, resource_id: &str, resource: Option<Resource>) {
        match resource {
            Some(resource) => {
                self.resources.insert(resource_id.to_string(), resource);
            }
            None => {
                self.resources.remove(resource_id);
            }
        }
    }
}
