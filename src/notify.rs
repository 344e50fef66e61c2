use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use thiserror::Error;

use crate::models::Task;
use crate::stats::days_until_due;
use crate::store::{self, Store, StoreError};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),
    #[error("Failed to deliver notification: {0}")]
    DeliveryError(String),
}

/// Whether the host lets us show notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    /// Never asked
    #[default]
    Default,
    Granted,
    Denied,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Permission::Default => "default",
            Permission::Granted => "granted",
            Permission::Denied => "denied",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
}

impl Notification {
    pub fn due_tomorrow(task: &Task) -> Self {
        Self {
            title: format!("Task Due Tomorrow: {}", task.title),
            body: format!("{} - Priority: {}", task.description, task.priority),
        }
    }
}

/// Host notification facility
pub trait Notifier {
    fn is_available(&self) -> bool;
    fn permission(&self) -> Permission;
    fn request_permission(&mut self) -> Result<Permission, NotifyError>;
    fn notify(&mut self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Prints reminders to a terminal stream. Permission is whatever the config
/// recorded; asking for it grants it.
pub struct TerminalNotifier<W: Write> {
    permission: Permission,
    out: W,
}

impl TerminalNotifier<std::io::Stdout> {
    pub fn stdout(permission: Permission) -> Self {
        Self::new(permission, std::io::stdout())
    }
}

impl<W: Write> TerminalNotifier<W> {
    pub fn new(permission: Permission, out: W) -> Self {
        Self { permission, out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Notifier for TerminalNotifier<W> {
    fn is_available(&self) -> bool {
        true
    }

    fn permission(&self) -> Permission {
        self.permission
    }

    fn request_permission(&mut self) -> Result<Permission, NotifyError> {
        self.permission = Permission::Granted;
        Ok(self.permission)
    }

    fn notify(&mut self, notification: &Notification) -> Result<(), NotifyError> {
        writeln!(self.out, "[reminder] {}\n           {}", notification.title, notification.body)
            .map_err(|e| NotifyError::DeliveryError(e.to_string()))
    }
}

/// Keeps every notification in memory instead of showing it
#[derive(Debug, Clone)]
pub struct RecordingNotifier {
    pub available: bool,
    pub permission: Permission,
    /// Answer given by `request_permission`
    pub grant_on_request: bool,
    pub sent: Vec<Notification>,
}

impl RecordingNotifier {
    pub fn granted() -> Self {
        Self {
            available: true,
            permission: Permission::Granted,
            grant_on_request: true,
            sent: Vec::new(),
        }
    }

    pub fn with_permission(permission: Permission) -> Self {
        Self {
            permission,
            ..Self::granted()
        }
    }
}

impl Notifier for RecordingNotifier {
    fn is_available(&self) -> bool {
        self.available
    }

    fn permission(&self) -> Permission {
        self.permission
    }

    fn request_permission(&mut self) -> Result<Permission, NotifyError> {
        self.permission = if self.grant_on_request {
            Permission::Granted
        } else {
            Permission::Denied
        };
        Ok(self.permission)
    }

    fn notify(&mut self, notification: &Notification) -> Result<(), NotifyError> {
        self.sent.push(notification.clone());
        Ok(())
    }
}

/// Fire a one-off reminder for every incomplete task due tomorrow.
///
/// A marker per task and due date keeps the same reminder from firing twice;
/// moving the due date makes the task eligible again. Returns the number of
/// reminders shown.
pub fn check_upcoming<S, N>(store: &S, notifier: &mut N, tasks: &[Task], now: NaiveDateTime) -> Result<usize, NotifyError>
where
    S: Store + ?Sized,
    N: Notifier + ?Sized,
{
    if !notifier.is_available() || notifier.permission() != Permission::Granted {
        return Ok(0);
    }

    let mut fired = 0;
    for task in tasks.iter().filter(|t| !t.completed) {
        if days_until_due(task.due_date, now) != 1 {
            continue;
        }
        let marker = store::notification_key(&task.id, task.due_date);
        if store.get(&marker)?.is_some() {
            continue;
        }
        if let Err(e) = notifier.notify(&Notification::due_tomorrow(task)) {
            tracing::warn!(task_id = %task.id, error = %e, "reminder not delivered");
            continue;
        }
        store.set(&marker, "true")?;
        tracing::info!(task_id = %task.id, due = %task.due_date, "reminder sent");
        fired += 1;
    }
    Ok(fired)
}
