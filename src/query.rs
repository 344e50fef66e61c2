use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::models::{Priority, Task};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PriorityFilter {
    #[default]
    All,
    Important,
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Pending,
    Completed,
}

/// Which date a range filter looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DateField {
    #[default]
    Due,
    Created,
}

/// Inclusive date window; an open end matches everything on that side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateRange {
    pub field: DateField,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    fn contains(&self, task: &Task) -> bool {
        let date = match self.field {
            DateField::Due => task.due_date,
            DateField::Created => task.created_at.date_naive(),
        };
        self.start.is_none_or(|start| date >= start) && self.end.is_none_or(|end| date <= end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Due,
    Created,
    Priority,
    Title,
}

impl SortBy {
    /// Direction used when the caller doesn't pick one. Creation date lists
    /// newest first.
    pub fn default_order(self) -> SortOrder {
        match self {
            SortBy::Created => SortOrder::Desc,
            _ => SortOrder::Asc,
        }
    }

    fn compare(self, a: &Task, b: &Task) -> Ordering {
        match self {
            SortBy::Due => a.due_date.cmp(&b.due_date),
            SortBy::Created => a.created_at.cmp(&b.created_at),
            SortBy::Priority => a.priority.rank().cmp(&b.priority.rank()),
            SortBy::Title => a
                .title
                .to_lowercase()
                .cmp(&b.title.to_lowercase())
                .then_with(|| a.title.cmp(&b.title)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn toggled(self) -> Self {
        match self {
            SortOrder::Asc => SortOrder::Desc,
            SortOrder::Desc => SortOrder::Asc,
        }
    }
}

/// Filter criteria plus sort key for a task listing
#[derive(Debug, Clone, Default)]
pub struct TaskQuery {
    pub search: String,
    pub priority: PriorityFilter,
    pub status: StatusFilter,
    pub date_range: Option<DateRange>,
    pub sort_by: SortBy,
    pub order: SortOrder,
}

impl TaskQuery {
    /// Dashboard listing: everything, soonest due first
    pub fn dashboard() -> Self {
        Self::default()
    }

    pub fn sorted_by(mut self, sort_by: SortBy) -> Self {
        self.sort_by = sort_by;
        self.order = sort_by.default_order();
        self
    }

    pub fn matches(&self, task: &Task) -> bool {
        self.matches_search(task)
            && self.matches_priority(task)
            && self.matches_status(task)
            && self.date_range.is_none_or(|range| range.contains(task))
    }

    fn matches_search(&self, task: &Task) -> bool {
        if self.search.is_empty() {
            return true;
        }
        let needle = self.search.to_lowercase();
        task.title.to_lowercase().contains(&needle) || task.description.to_lowercase().contains(&needle)
    }

    fn matches_priority(&self, task: &Task) -> bool {
        match self.priority {
            PriorityFilter::All => true,
            PriorityFilter::Important => task.priority == Priority::Important,
            PriorityFilter::Normal => task.priority == Priority::Normal,
        }
    }

    fn matches_status(&self, task: &Task) -> bool {
        match self.status {
            StatusFilter::All => true,
            StatusFilter::Pending => !task.completed,
            StatusFilter::Completed => task.completed,
        }
    }

    /// Whether any filter narrows the listing
    pub fn is_filtered(&self) -> bool {
        !self.search.is_empty()
            || self.priority != PriorityFilter::All
            || self.status != StatusFilter::All
            || self.date_range.is_some()
    }
}

/// Apply `query` to `tasks`. The sort is stable: ties keep input order.
pub fn query<'a>(tasks: &'a [Task], query: &TaskQuery) -> Vec<&'a Task> {
    let mut matched: Vec<&Task> = tasks.iter().filter(|t| query.matches(t)).collect();
    matched.sort_by(|a, b| {
        let ordering = query.sort_by.compare(a, b);
        match query.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
    matched
}
