use anyhow::anyhow;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::config::Config;
use crate::store::TaskStore;
use crate::task::{Priority, Subtask, TaskDraft};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Created(Uuid),
    Updated(Uuid),
    /// Validation failed; the store was not touched.
    Rejected,
}

/// Transient editing state: a draft being built up, either for a new task
/// or bound to an existing one. Commit pushes it into the store and
/// resets the session to its creating defaults.
#[derive(Debug)]
pub struct FormSession {
    pub draft: TaskDraft,
    editing: Option<Uuid>,
    default_category: String,
    default_priority: Priority,
}

impl FormSession {
    pub fn new(cfg: &Config) -> Self {
        let default_category = cfg.default_category();
        let default_priority = cfg.default_priority();
        Self {
            draft: TaskDraft::empty(&default_category, default_priority),
            editing: None,
            default_category,
            default_priority,
        }
    }

    pub fn editing_target(&self) -> Option<Uuid> {
        self.editing
    }

    #[instrument(skip(self, store), fields(uuid = %uuid))]
    pub fn start_edit(&mut self, store: &TaskStore, uuid: Uuid) -> anyhow::Result<()> {
        let task = store
            .get(uuid)
            .ok_or_else(|| anyhow!("no task with uuid {uuid}"))?;
        self.draft = TaskDraft::from_task(task);
        self.editing = Some(uuid);
        debug!("loaded task into edit session");
        Ok(())
    }

    /// Silent no-op when the title is blank after trimming.
    pub fn add_draft_subtask(&mut self, title: &str) {
        let title = title.trim();
        if title.is_empty() {
            return;
        }
        self.draft.subtasks.push(Subtask::new(title));
    }

    pub fn remove_draft_subtask(&mut self, index: usize) {
        if index < self.draft.subtasks.len() {
            self.draft.subtasks.remove(index);
        }
    }

    #[instrument(skip(self, store))]
    pub fn commit(&mut self, store: &mut TaskStore) -> anyhow::Result<CommitOutcome> {
        if !self.draft.is_valid() {
            debug!("commit rejected: draft missing required fields");
            return Ok(CommitOutcome::Rejected);
        }

        let outcome = match self.editing {
            Some(uuid) => {
                store.update(uuid, &self.draft)?;
                CommitOutcome::Updated(uuid)
            }
            None => match store.create(&self.draft)? {
                Some(uuid) => CommitOutcome::Created(uuid),
                None => CommitOutcome::Rejected,
            },
        };

        if outcome != CommitOutcome::Rejected {
            self.reset();
        }
        Ok(outcome)
    }

    /// Keeps the form from referencing a task that no longer exists.
    pub fn notify_deleted(&mut self, uuid: Uuid) {
        if self.editing == Some(uuid) {
            debug!(%uuid, "edited task deleted; resetting session");
            self.reset();
        }
    }

    pub fn reset(&mut self) {
        self.draft = TaskDraft::empty(&self.default_category, self.default_priority);
        self.editing = None;
    }
}
