//! # Configuration Store
//!
//! In-memory datastore contents keyed by schema path. Registered with the
//! composite coordinator as the participant that actually holds the
//! configuration `edit-config` writes and `get-config` reads.
//!
//! ## Edit Semantics
//!
//! | Operation | Path exists | Path missing |
//! |-----------|-------------|--------------|
//! | create    | rejected (data exists) | inserted |
//! | merge     | objects merged key by key, other values replaced | inserted |
//! | replace   | replaced | inserted |
//! | delete    | removed | rejected (data missing) |
//!
//! Pre-commit evaluates the edits in order, so a change set may create a
//! path and then delete it. Commit records an undo log so the change set can
//! be rolled back afterwards.

use async_trait::async_trait;
use nc_05_subsystem_coordinator::{Subsystem, SubsystemError};
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use shared_types::{ChangeOperation, ChangeSet, Datastore};
use std::collections::{BTreeMap, HashMap, VecDeque};
use tracing::debug;
use uuid::Uuid;

/// Committed change sets whose undo log is retained.
const UNDO_DEPTH: usize = 32;

type Contents = BTreeMap<String, Value>;

struct UndoRecord {
    change_set: Uuid,
    datastore: Datastore,
    /// Previous value of every touched path, in first-touch order.
    previous: Vec<(String, Option<Value>)>,
}

pub struct ConfigStore {
    name: String,
    datastores: RwLock<HashMap<Datastore, Contents>>,
    undo: Mutex<VecDeque<UndoRecord>>,
}

impl ConfigStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            datastores: RwLock::new(HashMap::new()),
            undo: Mutex::new(VecDeque::with_capacity(UNDO_DEPTH)),
        }
    }

    /// Current contents of one datastore as a JSON object.
    pub fn contents(&self, datastore: Datastore) -> Value {
        let datastores = self.datastores.read();
        let object: Map<String, Value> = datastores
            .get(&datastore)
            .map(|contents| contents.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        Value::Object(object)
    }

    pub fn get(&self, datastore: Datastore, path: &str) -> Option<Value> {
        self.datastores.read().get(&datastore)?.get(path).cloned()
    }

    fn reject(&self, path: &str, message: impl Into<String>) -> SubsystemError {
        SubsystemError::validation(self.name.clone(), message).at(path)
    }
}

fn merge_values(existing: &Value, incoming: &Value) -> Value {
    match (existing, incoming) {
        (Value::Object(current), Value::Object(update)) => {
            let mut merged = current.clone();
            for (key, value) in update {
                let next = match merged.get(key) {
                    Some(previous) => merge_values(previous, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), next);
            }
            Value::Object(merged)
        }
        _ => incoming.clone(),
    }
}

#[async_trait]
impl Subsystem for ConfigStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn pre_commit(&self, change_set: &ChangeSet) -> Result<(), SubsystemError> {
        let datastores = self.datastores.read();
        let current = datastores.get(&change_set.datastore());
        let mut overlay: HashMap<&str, bool> = HashMap::new();

        for change in change_set.changes() {
            let path = change.path.as_str();
            if !path.starts_with('/') {
                return Err(self.reject(path, format!("path {path:?} is not absolute")));
            }
            let exists = overlay
                .get(path)
                .copied()
                .unwrap_or_else(|| current.is_some_and(|c| c.contains_key(path)));

            match change.operation {
                ChangeOperation::Create if exists => {
                    return Err(self.reject(path, format!("data already exists at {path}")));
                }
                ChangeOperation::Delete if !exists => {
                    return Err(self.reject(path, format!("no data at {path}")));
                }
                ChangeOperation::Delete => {
                    overlay.insert(path, false);
                }
                ChangeOperation::Create | ChangeOperation::Merge | ChangeOperation::Replace => {
                    if change.value.is_none() {
                        return Err(self.reject(path, format!("a value is required at {path}")));
                    }
                    overlay.insert(path, true);
                }
            }
        }
        Ok(())
    }

    async fn commit(&self, change_set: &ChangeSet) -> Result<(), SubsystemError> {
        let mut datastores = self.datastores.write();
        let contents = datastores.entry(change_set.datastore()).or_default();
        let mut previous: Vec<(String, Option<Value>)> = Vec::new();

        for change in change_set.changes() {
            let path = change.path.as_str();
            if !previous.iter().any(|(p, _)| p == path) {
                previous.push((path.to_string(), contents.get(path).cloned()));
            }
            match (change.operation, &change.value) {
                (ChangeOperation::Delete, _) => {
                    contents.remove(path);
                }
                (ChangeOperation::Merge, Some(value)) => {
                    let next = match contents.get(path) {
                        Some(existing) => merge_values(existing, value),
                        None => value.clone(),
                    };
                    contents.insert(path.to_string(), next);
                }
                (_, Some(value)) => {
                    contents.insert(path.to_string(), value.clone());
                }
                (_, None) => {
                    return Err(SubsystemError::fatal(
                        self.name.clone(),
                        format!("change at {path} lost its value after pre-commit"),
                    ));
                }
            }
        }
        drop(datastores);

        let mut undo = self.undo.lock();
        if undo.len() == UNDO_DEPTH {
            undo.pop_front();
        }
        undo.push_back(UndoRecord {
            change_set: change_set.id(),
            datastore: change_set.datastore(),
            previous,
        });

        debug!(
            change_set = %change_set.id(),
            datastore = %change_set.datastore(),
            changes = change_set.len(),
            "[ConfigStore] committed"
        );
        Ok(())
    }

    async fn rollback(&self, change_set: &ChangeSet) -> Result<(), SubsystemError> {
        let record = {
            let mut undo = self.undo.lock();
            let position = undo.iter().position(|r| r.change_set == change_set.id());
            position.and_then(|i| undo.remove(i))
        };
        let Some(record) = record else {
            return Err(SubsystemError::fatal(
                self.name.clone(),
                format!("no undo log for change set {}", change_set.id()),
            ));
        };

        let mut datastores = self.datastores.write();
        let contents = datastores.entry(record.datastore).or_default();
        for (path, value) in record.previous.into_iter().rev() {
            match value {
                Some(value) => contents.insert(path, value),
                None => contents.remove(&path),
            };
        }
        debug!(change_set = %change_set.id(), "[ConfigStore] rolled back");
        Ok(())
    }

    fn retrieve_state(&self) -> Result<Value, SubsystemError> {
        let datastores = self.datastores.read();
        let mut state = Map::new();
        for (datastore, contents) in datastores.iter() {
            state.insert(datastore.name().to_string(), Value::from(contents.len()));
        }
        Ok(serde_json::json!({ "entries": state }))
    }
}
