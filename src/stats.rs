use chrono::{NaiveDate, NaiveDateTime};
use std::fmt;

use crate::models::{Priority, Task};

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Days from `now` until the start of `due`, rounded up.
///
/// A task due today reads 0 for the whole of today and one due tomorrow
/// reads 1.
pub fn days_until_due(due: NaiveDate, now: NaiveDateTime) -> i64 {
    let millis = (due.and_time(chrono::NaiveTime::MIN) - now).num_milliseconds();
    millis.div_euclid(MILLIS_PER_DAY) + i64::from(millis.rem_euclid(MILLIS_PER_DAY) != 0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueStatus {
    Completed,
    Overdue(i64),
    DueToday,
    DueTomorrow,
    DueIn(i64),
}

impl DueStatus {
    pub fn of(task: &Task, now: NaiveDateTime) -> Self {
        if task.completed {
            return DueStatus::Completed;
        }
        match days_until_due(task.due_date, now) {
            days if days < 0 => DueStatus::Overdue(-days),
            0 => DueStatus::DueToday,
            1 => DueStatus::DueTomorrow,
            days => DueStatus::DueIn(days),
        }
    }
}

impl fmt::Display for DueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DueStatus::Completed => write!(f, "Completed"),
            DueStatus::Overdue(days) => write!(f, "Overdue by {} days", days),
            DueStatus::DueToday => write!(f, "Due Today"),
            DueStatus::DueTomorrow => write!(f, "Due Tomorrow"),
            DueStatus::DueIn(days) => write!(f, "Due in {} days", days),
        }
    }
}

/// Counters shown on the dashboard and library views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskStats {
    pub total: usize,
    pub pending: usize,
    pub completed: usize,
    pub important: usize,
    pub overdue: usize,
    /// Incomplete and due within the upcoming window (today included)
    pub upcoming: usize,
}

impl TaskStats {
    pub fn collect(tasks: &[Task], now: NaiveDateTime, upcoming_window_days: i64) -> Self {
        let mut stats = TaskStats {
            total: tasks.len(),
            ..Default::default()
        };
        for task in tasks {
            if task.priority == Priority::Important {
                stats.important += 1;
            }
            if task.completed {
                stats.completed += 1;
                continue;
            }
            stats.pending += 1;
            if task.due_date.and_time(chrono::NaiveTime::MIN) < now {
                stats.overdue += 1;
            }
            let days = days_until_due(task.due_date, now);
            if (0..=upcoming_window_days).contains(&days) {
                stats.upcoming += 1;
            }
        }
        stats
    }
}
