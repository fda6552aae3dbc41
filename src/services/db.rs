use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::CoreError;
use crate::models::meeting::Meeting;
use crate::models::milestone::Milestone;
use crate::models::notification::Notification;
use crate::models::project::Project;
use crate::models::sprint::Sprint;
use crate::models::task::Task;
use crate::models::user::User;

/// a stored document plus the row version it was read at
#[derive(Clone, Debug)]
pub struct Versioned<T> {
    pub doc: T,
    pub version: u64,
}

/// In-process row-versioned collection. Every committed write bumps the row
/// version; writers that read a stale version lose with Conflict.
pub struct Collection<T> {
    docs: DashMap<Uuid, Versioned<T>>,
}

impl<T: Clone> Collection<T> {
    fn new() -> Self {
        Self {
            docs: DashMap::new(),
        }
    }

    pub fn insert(&self, id: Uuid, doc: T) {
        self.docs.insert(id, Versioned { doc, version: 0 });
    }

    pub fn get(&self, id: Uuid) -> Option<Versioned<T>> {
        self.docs.get(&id).map(|entry| entry.value().clone())
    }

    /**
     * commit a replacement only if the row is still at the version the
     * caller read it at
     */
    pub fn try_replace(&self, id: Uuid, expected_version: u64, doc: T) -> Result<(), CoreError> {
        match self.docs.get_mut(&id) {
            Some(mut entry) => {
                if entry.version != expected_version {
                    return Err(CoreError::Conflict(
                        "the record changed while this update was being prepared".into(),
                    ));
                }
                entry.doc = doc;
                entry.version += 1;
                Ok(())
            }
            None => Err(CoreError::NotFound("the record no longer exists".into())),
        }
    }

    /**
     * run f against a draft copy under the row lock and commit only when it
     * succeeds, so a failed mutation leaves the row untouched
     */
    pub fn mutate<R>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut T) -> Result<R, CoreError>,
    ) -> Result<R, CoreError> {
        match self.docs.get_mut(&id) {
            Some(mut entry) => {
                let mut draft = entry.doc.clone();
                let out = f(&mut draft)?;
                entry.doc = draft;
                entry.version += 1;
                Ok(out)
            }
            None => Err(CoreError::NotFound("the record no longer exists".into())),
        }
    }

    pub fn remove(&self, id: Uuid) -> Option<T> {
        self.docs.remove(&id).map(|(_, versioned)| versioned.doc)
    }

    /// snapshot of every document matching the predicate
    pub fn find(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        self.docs
            .iter()
            .filter(|entry| pred(&entry.value().doc))
            .map(|entry| entry.value().doc.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

pub struct Database {
    pub users: Collection<User>,
    pub projects: Collection<Project>,
    pub milestones: Collection<Milestone>,
    pub tasks: Collection<Task>,
    pub sprints: Collection<Sprint>,
    pub meetings: Collection<Meeting>,
    pub notifications: Collection<Notification>,
}

impl Database {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            users: Collection::new(),
            projects: Collection::new(),
            milestones: Collection::new(),
            tasks: Collection::new(),
            sprints: Collection::new(),
            meetings: Collection::new(),
            notifications: Collection::new(),
        })
    }
}
