use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{NewTask, Task, TaskUpdate, User};
use crate::store::{self, Store, StoreError};
use crate::utils;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),
    #[error("Invalid task: {0}")]
    Validation(String),
    #[error("Not logged in")]
    NotAuthenticated,
}

fn require_text(field: &str, value: &str) -> Result<(), TaskError> {
    if value.trim().is_empty() {
        return Err(TaskError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

/// The session user's task list, mirrored to the store on every change
#[derive(Debug, Default)]
pub struct TaskService {
    owner: Option<String>,
    tasks: Vec<Task>,
}

impl TaskService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `user`'s list, replacing whatever was held before
    pub fn load<S: Store + ?Sized>(&mut self, store: &S, user: &User) -> Result<(), TaskError> {
        let tasks: Vec<Task> = store::load_json(store, &store::tasks_key(&user.id))?.unwrap_or_default();
        tracing::debug!(user_id = %user.id, count = tasks.len(), "loaded tasks");
        self.owner = Some(user.id.clone());
        self.tasks = tasks;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.owner = None;
        self.tasks.clear();
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    fn persist<S: Store + ?Sized>(&self, store: &S) -> Result<(), TaskError> {
        if let Some(ref owner) = self.owner {
            store::save_json(store, &store::tasks_key(owner), &self.tasks)?;
        }
        Ok(())
    }

    pub fn add_task<S: Store + ?Sized>(
        &mut self,
        store: &S,
        new_task: NewTask,
        now: DateTime<Utc>,
    ) -> Result<Task, TaskError> {
        let owner = self.owner.clone().ok_or(TaskError::NotAuthenticated)?;
        require_text("title", &new_task.title)?;
        require_text("description", &new_task.description)?;

        let task = Task {
            id: utils::next_id(|id| self.tasks.iter().any(|t| t.id == id)),
            title: new_task.title,
            description: new_task.description,
            due_date: new_task.due_date,
            priority: new_task.priority,
            completed: false,
            created_at: now,
            user_id: owner,
        };
        self.tasks.push(task.clone());
        self.persist(store)?;

        tracing::info!(task_id = %task.id, "task added");
        Ok(task)
    }

    /// Merge `update` into the task with `id`. Returns false if no such task.
    pub fn update_task<S: Store + ?Sized>(&mut self, store: &S, id: &str, update: TaskUpdate) -> Result<bool, TaskError> {
        if let Some(ref title) = update.title {
            require_text("title", title)?;
        }
        if let Some(ref description) = update.description {
            require_text("description", description)?;
        }

        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            return Ok(false);
        };
        update.apply_to(task);
        self.persist(store)?;

        tracing::info!(task_id = %id, "task updated");
        Ok(true)
    }

    pub fn delete_task<S: Store + ?Sized>(&mut self, store: &S, id: &str) -> Result<bool, TaskError> {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        if self.tasks.len() == before {
            return Ok(false);
        }
        self.persist(store)?;

        tracing::info!(task_id = %id, "task deleted");
        Ok(true)
    }

    pub fn toggle_task<S: Store + ?Sized>(&mut self, store: &S, id: &str) -> Result<bool, TaskError> {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            return Ok(false);
        };
        task.completed = !task.completed;
        let completed = task.completed;
        self.persist(store)?;

        tracing::info!(task_id = %id, completed, "task toggled");
        Ok(true)
    }
}
