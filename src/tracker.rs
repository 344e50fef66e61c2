use chrono::{DateTime, Local, NaiveDateTime, Utc};
use thiserror::Error;

use crate::auth::AuthService;
use crate::models::{NewTask, ProfileUpdate, Task, TaskUpdate, User};
use crate::notify::{self, Notifier, NotifyError, Permission};
use crate::query::{self, TaskQuery};
use crate::stats::TaskStats;
use crate::store::{Store, StoreError};
use crate::tasks::{TaskError, TaskService};

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error(transparent)]
    Notify(#[from] NotifyError),
}

/// Source of "now". Timestamps are stored in UTC; due dates are compared
/// against local wall-clock time, so "tomorrow" is the user's calendar day.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
    fn local_now(&self) -> NaiveDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn local_now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Clock pinned to one instant, with local time equal to UTC
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0.and_utc()
    }

    fn local_now(&self) -> NaiveDateTime {
        self.0
    }
}

/// Session-scoped application state.
///
/// Owns the store, the notifier and the clock, and hands them to the services
/// on each call. Logging in loads the user's tasks; logging out drops them.
/// Every change to the task list is followed by a reminder scan.
pub struct Tracker<S: Store, N: Notifier, C: Clock = SystemClock> {
    store: S,
    notifier: N,
    clock: C,
    auth: AuthService,
    tasks: TaskService,
}

impl<S: Store, N: Notifier> Tracker<S, N> {
    pub fn open(store: S, notifier: N) -> Result<Self, TrackerError> {
        Self::open_with_clock(store, notifier, SystemClock)
    }
}

impl<S: Store, N: Notifier, C: Clock> Tracker<S, N, C> {
    /// Restore the persisted session (if any) and its tasks
    pub fn open_with_clock(store: S, notifier: N, clock: C) -> Result<Self, TrackerError> {
        let auth = AuthService::restore(&store)?;
        let mut tracker = Self {
            store,
            notifier,
            clock,
            auth,
            tasks: TaskService::new(),
        };
        tracker.load_session_tasks()?;
        Ok(tracker)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn current_user(&self) -> Option<&User> {
        self.auth.current_user()
    }

    fn load_session_tasks(&mut self) -> Result<(), TrackerError> {
        match self.auth.current_user() {
            Some(user) => {
                self.tasks.load(&self.store, user)?;
                self.scan_after_change();
            }
            None => self.tasks.clear(),
        }
        Ok(())
    }

    pub fn register(
        &mut self,
        email: &str,
        password: &str,
        name: &str,
        department: Option<&str>,
    ) -> Result<bool, TrackerError> {
        let ok = self.auth.register(&self.store, email, password, name, department)?;
        if ok {
            self.load_session_tasks()?;
        }
        Ok(ok)
    }

    pub fn login(&mut self, email: &str, password: &str) -> Result<bool, TrackerError> {
        let ok = self.auth.login(&self.store, email, password)?;
        if ok {
            self.load_session_tasks()?;
        }
        Ok(ok)
    }

    pub fn logout(&mut self) -> Result<(), TrackerError> {
        self.auth.logout(&self.store)?;
        self.tasks.clear();
        Ok(())
    }

    pub fn update_profile(&mut self, update: ProfileUpdate) -> Result<bool, TrackerError> {
        Ok(self.auth.update_profile(&self.store, update)?)
    }

    /// Tasks of the session user; empty when nobody is logged in
    pub fn tasks(&self) -> &[Task] {
        self.tasks.tasks()
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn query(&self, query: &TaskQuery) -> Vec<&Task> {
        query::query(self.tasks.tasks(), query)
    }

    pub fn stats(&self, upcoming_window_days: i64) -> TaskStats {
        TaskStats::collect(self.tasks.tasks(), self.clock.local_now(), upcoming_window_days)
    }

    pub fn local_now(&self) -> NaiveDateTime {
        self.clock.local_now()
    }

    pub fn add_task(&mut self, new_task: NewTask) -> Result<Task, TrackerError> {
        let task = self.tasks.add_task(&self.store, new_task, self.clock.now())?;
        self.scan_after_change();
        Ok(task)
    }

    pub fn update_task(&mut self, id: &str, update: TaskUpdate) -> Result<bool, TrackerError> {
        let changed = self.tasks.update_task(&self.store, id, update)?;
        self.after_change(changed)
    }

    pub fn delete_task(&mut self, id: &str) -> Result<bool, TrackerError> {
        let changed = self.tasks.delete_task(&self.store, id)?;
        self.after_change(changed)
    }

    pub fn toggle_task(&mut self, id: &str) -> Result<bool, TrackerError> {
        let changed = self.tasks.toggle_task(&self.store, id)?;
        self.after_change(changed)
    }

    fn after_change(&mut self, changed: bool) -> Result<bool, TrackerError> {
        if changed {
            self.scan_after_change();
        }
        Ok(changed)
    }

    // The change is already persisted, so a failed scan must not fail it
    fn scan_after_change(&mut self) {
        if let Err(e) = self.check_reminders() {
            tracing::warn!(error = %e, "reminder scan failed");
        }
    }

    /// Run the due-tomorrow scan over the session's tasks
    pub fn check_reminders(&mut self) -> Result<usize, TrackerError> {
        let now = self.clock.local_now();
        Ok(notify::check_upcoming(&self.store, &mut self.notifier, self.tasks.tasks(), now)?)
    }

    /// Ask the host for permission and scan right away if it was granted
    pub fn enable_notifications(&mut self) -> Result<Permission, TrackerError> {
        if !self.notifier.is_available() {
            return Ok(self.notifier.permission());
        }
        let permission = self.notifier.request_permission()?;
        if permission == Permission::Granted {
            self.scan_after_change();
        }
        Ok(permission)
    }
}
