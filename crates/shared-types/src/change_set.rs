//! # Change Sets
//!
//! An immutable description of a pending configuration change.
//!
//! A `ChangeSet` is assembled with a `ChangeSetBuilder` and frozen into an
//! `Arc<ChangeSet>` before the coordinator fans it out. Every subsystem in a
//! transaction sees the same shared instance; nothing can mutate it after
//! `build()`.

use crate::entities::{Datastore, SessionId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Schema location a change applies to, e.g. `/interfaces/interface[name='eth0']`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaPath(String);

impl SchemaPath {
    /// Wrap a path string.
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Borrow the path.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `self` equals `other` or lies beneath it.
    #[must_use]
    pub fn is_within(&self, other: &SchemaPath) -> bool {
        self.0 == other.0
            || (self.0.starts_with(&other.0) && self.0[other.0.len()..].starts_with('/'))
    }
}

impl fmt::Display for SchemaPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Edit operation applied at a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOperation {
    Create,
    Merge,
    Replace,
    Delete,
}

/// One edit within a change set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    /// Location of the edit.
    pub path: SchemaPath,
    /// What to do there.
    pub operation: ChangeOperation,
    /// New value (absent for deletes).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

/// A frozen configuration change.
#[derive(Debug, PartialEq, Serialize)]
pub struct ChangeSet {
    id: Uuid,
    datastore: Datastore,
    origin: Option<SessionId>,
    changes: Vec<Change>,
}

impl ChangeSet {
    /// Start building a change set against a datastore.
    #[must_use]
    pub fn builder(datastore: Datastore) -> ChangeSetBuilder {
        ChangeSetBuilder {
            datastore,
            origin: None,
            changes: Vec::new(),
        }
    }

    /// Unique id of this change set (time-ordered).
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Target datastore.
    #[must_use]
    pub fn datastore(&self) -> Datastore {
        self.datastore
    }

    /// Session that produced the change, if any.
    #[must_use]
    pub fn origin(&self) -> Option<SessionId> {
        self.origin
    }

    /// All edits in order.
    #[must_use]
    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    /// Edits at or beneath a schema location.
    pub fn changes_within<'a>(&'a self, scope: &'a SchemaPath) -> impl Iterator<Item = &'a Change> {
        self.changes.iter().filter(move |c| c.path.is_within(scope))
    }

    /// Number of edits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Whether there are no edits.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Mutable builder for a `ChangeSet`.
#[derive(Debug)]
pub struct ChangeSetBuilder {
    datastore: Datastore,
    origin: Option<SessionId>,
    changes: Vec<Change>,
}

impl ChangeSetBuilder {
    /// Record the originating session.
    #[must_use]
    pub fn origin(mut self, session_id: SessionId) -> Self {
        self.origin = Some(session_id);
        self
    }

    /// Append an edit.
    #[must_use]
    pub fn change(
        mut self,
        path: impl Into<String>,
        operation: ChangeOperation,
        value: Option<serde_json::Value>,
    ) -> Self {
        self.changes.push(Change {
            path: SchemaPath::new(path),
            operation,
            value,
        });
        self
    }

    /// Append a list of already-built edits.
    #[must_use]
    pub fn extend(mut self, changes: impl IntoIterator<Item = Change>) -> Self {
        self.changes.extend(changes);
        self
    }

    /// Freeze into a shareable change set.
    #[must_use]
    pub fn build(self) -> Arc<ChangeSet> {
        Arc::new(ChangeSet {
            id: Uuid::now_v7(),
            datastore: self.datastore,
            origin: self.origin,
            changes: self.changes,
        })
    }
}
