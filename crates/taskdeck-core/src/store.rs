use std::path::Path;

use anyhow::anyhow;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::storage::Storage;
use crate::task::{Task, TaskDraft};

/// Owns the in-memory collection; every mutating operation rewrites the
/// whole collection through the storage adapter before returning.
#[derive(Debug)]
pub struct TaskStore {
    tasks: Vec<Task>,
    storage: Storage,
}

impl TaskStore {
    #[instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let storage = Storage::open(data_dir)?;
        let tasks = storage.load();
        info!(count = tasks.len(), "opened task store");
        Ok(Self { tasks, storage })
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, uuid: Uuid) -> Option<&Task> {
        self.tasks.iter().find(|t| t.uuid == uuid)
    }

    pub fn find_by_display_id(&self, id: u64) -> Option<Uuid> {
        self.tasks
            .iter()
            .find(|t| t.id == Some(id))
            .map(|t| t.uuid)
    }

    fn next_display_id(&self) -> u64 {
        self.tasks.iter().filter_map(|t| t.id).max().unwrap_or(0) + 1
    }

    fn persist(&self) -> anyhow::Result<()> {
        self.storage.save(&self.tasks)
    }

    /// Returns `None` without mutating when the draft fails validation;
    /// the form session gates before calling, this is the second check.
    #[instrument(skip(self, draft))]
    pub fn create(&mut self, draft: &TaskDraft) -> anyhow::Result<Option<Uuid>> {
        if !draft.is_valid() {
            debug!("rejected create: draft missing required fields");
            return Ok(None);
        }
        let Some(due_date) = draft.due_date else {
            return Ok(None);
        };

        let task = Task {
            uuid: Uuid::new_v4(),
            id: Some(self.next_display_id()),
            title: draft.title.trim().to_string(),
            description: draft.description.trim().to_string(),
            due_date,
            due_time: draft.due_time,
            priority: draft.priority,
            category: draft.category.trim().to_string(),
            recurrence: draft.recurrence,
            completed: false,
            subtasks: draft.subtasks.clone(),
        };
        let uuid = task.uuid;

        debug!(%uuid, id = ?task.id, "created task");
        self.tasks.push(task);
        self.persist()?;
        Ok(Some(uuid))
    }

    /// Overwrites every mutable field, replacing the subtask sequence
    /// wholesale. The completed flag and identity are untouched.
    #[instrument(skip(self, draft), fields(uuid = %uuid))]
    pub fn update(&mut self, uuid: Uuid, draft: &TaskDraft) -> anyhow::Result<()> {
        let Some(due_date) = draft.due_date else {
            return Err(anyhow!("draft has no due date"));
        };
        let task = self
            .tasks
            .iter_mut()
            .find(|t| t.uuid == uuid)
            .ok_or_else(|| anyhow!("no task with uuid {uuid}"))?;

        task.title = draft.title.trim().to_string();
        task.description = draft.description.trim().to_string();
        task.due_date = due_date;
        task.due_time = draft.due_time;
        task.priority = draft.priority;
        task.category = draft.category.trim().to_string();
        task.recurrence = draft.recurrence;
        task.subtasks = draft.subtasks.clone();

        debug!("updated task");
        self.persist()
    }

    #[instrument(skip(self), fields(uuid = %uuid))]
    pub fn delete(&mut self, uuid: Uuid) -> anyhow::Result<()> {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.uuid != uuid);
        if self.tasks.len() == before {
            return Err(anyhow!("no task with uuid {uuid}"));
        }
        debug!("deleted task");
        self.persist()
    }

    /// Flips the completed flag. Completing a recurring task spawns its
    /// successor in the same snapshot write; the spawned uuid is returned.
    #[instrument(skip(self), fields(uuid = %uuid))]
    pub fn toggle_complete(&mut self, uuid: Uuid) -> anyhow::Result<Option<Uuid>> {
        let next_id = self.next_display_id();
        let task = self
            .tasks
            .iter_mut()
            .find(|t| t.uuid == uuid)
            .ok_or_else(|| anyhow!("no task with uuid {uuid}"))?;

        task.completed = !task.completed;

        let mut spawned = None;
        if task.completed
            && let Some(next_due) = task.recurrence.next_due(task.due_date)
        {
            let mut successor = task.clone();
            successor.uuid = Uuid::new_v4();
            successor.id = Some(next_id);
            successor.due_date = next_due;
            successor.completed = false;
            for sub in &mut successor.subtasks {
                sub.completed = false;
            }
            info!(
                successor = %successor.uuid,
                due = %next_due,
                "spawned recurring successor"
            );
            spawned = Some(successor.uuid);
            self.tasks.push(successor);
        }

        self.persist()?;
        Ok(spawned)
    }

    /// Flips the indexed subtask, then re-derives the parent's completed
    /// flag: done exactly when every subtask is done.
    #[instrument(skip(self), fields(uuid = %uuid, index))]
    pub fn toggle_subtask(&mut self, uuid: Uuid, index: usize) -> anyhow::Result<()> {
        let task = self
            .tasks
            .iter_mut()
            .find(|t| t.uuid == uuid)
            .ok_or_else(|| anyhow!("no task with uuid {uuid}"))?;

        let count = task.subtasks.len();
        let sub = task
            .subtasks
            .get_mut(index)
            .ok_or_else(|| anyhow!("subtask index {index} out of range (task has {count})"))?;
        sub.completed = !sub.completed;

        task.completed = task.subtasks.iter().all(|s| s.completed);
        self.persist()
    }

    #[instrument(skip(self))]
    pub fn clear_all(&mut self) -> anyhow::Result<()> {
        info!(count = self.tasks.len(), "clearing all tasks");
        self.tasks.clear();
        self.persist()
    }
}
