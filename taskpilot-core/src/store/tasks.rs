//! Task list and the actions that change it.
//!
//! Every action talks to the backend first and only touches the local list
//! once the backend has accepted the change.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::types::{NewTask, Task, TaskPriority, TaskUpdate};

use super::generation::{Generation, Ticket};

/// How imported tasks combine with the current list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportMode {
    #[default]
    Replace,
    Append,
}

/// An assistant suggestion that can be stored on a task
#[derive(Debug, Clone, PartialEq)]
pub enum Suggestion {
    Deadline(DateTime<Utc>),
    /// Replaces existing milestones
    Milestones(Vec<String>),
    Category(String),
    Description(String),
    Priority(TaskPriority),
}

pub struct TaskStore {
    backend: Arc<dyn Backend>,
    tasks: Vec<Task>,
    today: Vec<Task>,
    generation: Generation,
}

impl TaskStore {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            tasks: Vec::new(),
            today: Vec::new(),
            generation: Generation::new(),
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn today(&self) -> &[Task] {
        &self.today
    }

    pub fn get(&self, id: u64) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Loaded task or [`Error::TaskNotFound`]
    pub fn require(&self, id: u64) -> Result<&Task> {
        self.get(id).ok_or(Error::TaskNotFound(id))
    }

    pub async fn refresh(&mut self) -> Result<&[Task]> {
        let ticket = self.begin_refresh();
        let result = self.backend.list_tasks().await;
        self.finish_refresh(ticket, result)?;
        Ok(&self.tasks)
    }

    pub fn begin_refresh(&self) -> Ticket {
        self.generation.begin()
    }

    /// Apply a refresh response, unless a newer refresh has started.
    ///
    /// Returns whether the response was applied.
    pub fn finish_refresh(&mut self, ticket: Ticket, result: Result<Vec<Task>>) -> Result<bool> {
        let tasks = result?;
        if !self.generation.is_current(ticket) {
            tracing::debug!("Discarding stale task list response");
            return Ok(false);
        }
        tracing::debug!(count = tasks.len(), "Tasks refreshed");
        self.tasks = tasks;
        Ok(true)
    }

    pub async fn refresh_today(&mut self) -> Result<&[Task]> {
        self.today = self.backend.today_tasks().await?;
        Ok(&self.today)
    }

    /// Fetch one task, preferring the loaded copy.
    pub async fn fetch(&self, id: u64) -> Result<Task> {
        match self.get(id) {
            Some(task) => Ok(task.clone()),
            None => self.backend.get_task(id).await,
        }
    }

    pub async fn add(&mut self, task: NewTask) -> Result<Task> {
        let created = self.backend.create_task(&task).await?;
        tracing::info!(id = created.id, "Task created");
        self.tasks.insert(0, created.clone());
        Ok(created)
    }

    pub async fn update(&mut self, id: u64, update: TaskUpdate) -> Result<Task> {
        let updated = self.backend.update_task(id, &update).await?;
        self.replace_local(updated.clone());
        Ok(updated)
    }

    pub async fn delete(&mut self, id: u64) -> Result<()> {
        self.backend.delete_task(id).await?;
        tracing::info!(id, "Task deleted");
        self.tasks.retain(|t| t.id != id);
        self.today.retain(|t| t.id != id);
        Ok(())
    }

    /// Send imported tasks to the backend and merge them into the list.
    ///
    /// The backend only ever receives the imported tasks. `Replace` first
    /// deletes every task the backend holds; a failure part way leaves the
    /// local list matching what was actually deleted.
    pub async fn import(&mut self, imported: Vec<Task>, mode: ImportMode) -> Result<usize> {
        let count = imported.len();
        if mode == ImportMode::Replace {
            let current = self.backend.list_tasks().await?;
            let mut ids: Vec<u64> = current.iter().map(|t| t.id).collect();
            ids.sort_unstable();
            ids.dedup();
            for id in ids {
                self.delete(id).await?;
            }
        }
        self.backend.import_tasks(&imported).await?;
        tracing::info!(count, ?mode, "Tasks imported");
        self.generation.begin();
        match mode {
            ImportMode::Replace => {
                self.tasks = imported;
                self.today.clear();
            }
            ImportMode::Append => self.tasks.extend(imported),
        }
        Ok(count)
    }

    /// Mark a milestone (un)completed and store the derived task status.
    pub async fn toggle_milestone(
        &mut self,
        task_id: u64,
        milestone_id: u64,
        completed: bool,
    ) -> Result<Task> {
        let mut task = self.fetch(task_id).await?;
        task.toggle_milestone(milestone_id, completed, Utc::now())?;
        self.update(task_id, TaskUpdate::milestones_of(&task)).await
    }

    pub async fn apply(&mut self, task_id: u64, suggestion: Suggestion) -> Result<Task> {
        let update = match suggestion {
            Suggestion::Deadline(deadline) => TaskUpdate {
                deadline: Some(deadline),
                ..Default::default()
            },
            Suggestion::Milestones(titles) => {
                if titles.is_empty() {
                    return Err(Error::InvalidInput("no milestones to apply".to_string()));
                }
                let mut task = self.fetch(task_id).await?;
                task.replace_milestones(titles);
                TaskUpdate {
                    status: Some(task.derived_status()),
                    milestones: Some(task.milestones),
                    ..Default::default()
                }
            }
            Suggestion::Category(category) => TaskUpdate {
                category: Some(category),
                ..Default::default()
            },
            Suggestion::Description(description) => TaskUpdate {
                description: Some(description),
                ..Default::default()
            },
            Suggestion::Priority(priority) => TaskUpdate {
                priority: Some(priority),
                ..Default::default()
            },
        };
        self.update(task_id, update).await
    }

    fn replace_local(&mut self, task: Task) {
        for list in [&mut self.tasks, &mut self.today] {
            if let Some(slot) = list.iter_mut().find(|t| t.id == task.id) {
                *slot = task.clone();
            }
        }
    }

    pub(crate) fn clear(&mut self) {
        self.generation.begin();
        self.tasks.clear();
        self.today.clear();
    }
}
