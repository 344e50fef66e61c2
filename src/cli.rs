use chrono::NaiveDateTime;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::Path;
use thiserror::Error;

use crate::config::{Config, ConfigError};
use crate::models::{NewTask, Priority, ProfileUpdate, Task, TaskUpdate};
use crate::notify::{Notifier, Permission};
use crate::query::{DateField, DateRange, PriorityFilter, SortBy, SortOrder, StatusFilter, TaskQuery};
use crate::stats::DueStatus;
use crate::store::Store;
use crate::tracker::{Clock, Tracker, TrackerError};
use crate::utils::parse_date;

#[derive(Parser)]
#[command(name = "studytrack")]
#[command(about = "Academic task tracker with due-date reminders")]
#[command(version)]
pub struct Cli {
    /// Custom config file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Use development mode (uses separate dev config/database)
    #[arg(long)]
    pub dev: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create an account and log in
    Register {
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        department: Option<String>,
    },
    /// Log in to an existing account
    Login {
        email: String,
        #[arg(long)]
        password: String,
    },
    /// End the current session
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Update name, department, email or password
    Profile {
        #[arg(long)]
        name: Option<String>,
        /// New department; pass an empty string to clear it
        #[arg(long)]
        department: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        current_password: Option<String>,
        #[arg(long)]
        new_password: Option<String>,
    },
    /// Add a new task
    Add {
        /// Task title
        title: String,
        /// What needs doing
        #[arg(long)]
        description: String,
        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: String,
        /// important or normal
        #[arg(long, default_value = "normal")]
        priority: Priority,
    },
    /// Edit fields of an existing task
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,
        #[arg(long)]
        priority: Option<Priority>,
    },
    /// Flip a task between pending and completed
    Toggle { id: String },
    /// Delete a task
    Delete { id: String },
    /// List tasks with optional filters
    List(ListArgs),
    /// Show task counters
    Stats,
    /// Check for tasks due tomorrow and show reminders
    Remind,
    /// Manage reminder permission
    Notifications {
        #[arg(value_enum)]
        action: NotificationAction,
    },
}

#[derive(Debug, Default, clap::Args)]
pub struct ListArgs {
    /// Case-insensitive text to look for in title or description
    #[arg(long)]
    pub search: Option<String>,
    #[arg(long, value_enum)]
    pub priority: Option<PriorityFilter>,
    #[arg(long, value_enum)]
    pub status: Option<StatusFilter>,
    /// Start of date window (YYYY-MM-DD, inclusive)
    #[arg(long)]
    pub from: Option<String>,
    /// End of date window (YYYY-MM-DD, inclusive)
    #[arg(long)]
    pub to: Option<String>,
    /// Date the window applies to
    #[arg(long, value_enum, default_value = "due")]
    pub date_field: DateField,
    #[arg(long, value_enum)]
    pub sort: Option<SortBy>,
    #[arg(long, value_enum)]
    pub order: Option<SortOrder>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum NotificationAction {
    Enable,
    Disable,
    Status,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    TrackerError(#[from] TrackerError),
    #[error("Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Failed to parse date: {0}")]
    DateParseError(String),
    #[error("Not logged in. Run `studytrack login` or `studytrack register` first.")]
    NotLoggedIn,
    #[error("{0}")]
    Rejected(String),
    #[error("No task with ID {0}")]
    TaskNotFound(String),
}

fn parse_due(due_str: &str) -> Result<chrono::NaiveDate, CliError> {
    parse_date(due_str)
        .map_err(|e| CliError::DateParseError(format!("Invalid date format '{}': {}", due_str, e)))
}

fn require_login<S: Store, N: Notifier, C: Clock>(tracker: &Tracker<S, N, C>) -> Result<(), CliError> {
    if tracker.current_user().is_none() {
        return Err(CliError::NotLoggedIn);
    }
    Ok(())
}

/// One-line summary used by `list` and the dashboard
pub fn format_task_line(task: &Task, now: NaiveDateTime) -> String {
    let check = if task.completed { "x" } else { " " };
    format!(
        "[{}] {}  {}  {:<9}  {}  ({})",
        check,
        task.id,
        task.due_date.format("%Y-%m-%d"),
        task.priority,
        task.title,
        DueStatus::of(task, now)
    )
}

/// Handle the register command
pub fn handle_register<S: Store, N: Notifier, C: Clock>(
    tracker: &mut Tracker<S, N, C>,
    email: String,
    password: String,
    name: String,
    department: Option<String>,
) -> Result<(), CliError> {
    if !tracker.register(&email, &password, &name, department.as_deref())? {
        return Err(CliError::Rejected(format!("An account for {} already exists", email)));
    }
    println!("Registered and logged in as {}", email);
    Ok(())
}

/// Handle the login command
pub fn handle_login<S: Store, N: Notifier, C: Clock>(
    tracker: &mut Tracker<S, N, C>,
    email: String,
    password: String,
) -> Result<(), CliError> {
    if !tracker.login(&email, &password)? {
        return Err(CliError::Rejected("Invalid email or password".to_string()));
    }
    println!("Logged in as {}", email);
    Ok(())
}

pub fn handle_logout<S: Store, N: Notifier, C: Clock>(tracker: &mut Tracker<S, N, C>) -> Result<(), CliError> {
    tracker.logout()?;
    println!("Logged out");
    Ok(())
}

pub fn handle_whoami<S: Store, N: Notifier, C: Clock>(tracker: &Tracker<S, N, C>) -> Result<(), CliError> {
    let user = tracker.current_user().ok_or(CliError::NotLoggedIn)?;
    match user.department {
        Some(ref department) => println!("{} <{}> ({} Department)", user.name, user.email, department),
        None => println!("{} <{}>", user.name, user.email),
    }
    Ok(())
}

/// Handle the profile command. Omitted fields keep their current values;
/// an empty department clears it.
pub fn handle_profile<S: Store, N: Notifier, C: Clock>(
    tracker: &mut Tracker<S, N, C>,
    name: Option<String>,
    department: Option<String>,
    email: Option<String>,
    current_password: Option<String>,
    new_password: Option<String>,
) -> Result<(), CliError> {
    let user = tracker.current_user().ok_or(CliError::NotLoggedIn)?;
    let update = ProfileUpdate {
        name: name.unwrap_or_else(|| user.name.clone()),
        department: match department {
            Some(department) if department.trim().is_empty() => None,
            Some(department) => Some(department),
            None => user.department.clone(),
        },
        email: email.unwrap_or_else(|| user.email.clone()),
        current_password,
        new_password,
    };
    if !tracker.update_profile(update)? {
        return Err(CliError::Rejected("Profile update rejected".to_string()));
    }
    println!("Profile updated");
    Ok(())
}

/// Handle the add command
pub fn handle_add<S: Store, N: Notifier, C: Clock>(
    tracker: &mut Tracker<S, N, C>,
    title: String,
    description: String,
    due: String,
    priority: Priority,
) -> Result<Task, CliError> {
    require_login(tracker)?;
    let due_date = parse_due(&due)?;
    let task = tracker.add_task(NewTask::new(title, description, due_date).with_priority(priority))?;
    println!("Task created successfully (ID: {})", task.id);
    Ok(task)
}

/// Handle the edit command
pub fn handle_edit<S: Store, N: Notifier, C: Clock>(
    tracker: &mut Tracker<S, N, C>,
    id: String,
    title: Option<String>,
    description: Option<String>,
    due: Option<String>,
    priority: Option<Priority>,
) -> Result<(), CliError> {
    require_login(tracker)?;
    let due_date = due.as_deref().map(parse_due).transpose()?;
    let update = TaskUpdate {
        title,
        description,
        due_date,
        priority,
        completed: None,
    };
    if update.is_empty() {
        return Err(CliError::Rejected("Nothing to change".to_string()));
    }
    if !tracker.update_task(&id, update)? {
        return Err(CliError::TaskNotFound(id));
    }
    println!("Task {} updated", id);
    Ok(())
}

pub fn handle_toggle<S: Store, N: Notifier, C: Clock>(tracker: &mut Tracker<S, N, C>, id: String) -> Result<(), CliError> {
    require_login(tracker)?;
    if !tracker.toggle_task(&id)? {
        return Err(CliError::TaskNotFound(id));
    }
    let state = match tracker.task(&id) {
        Some(task) if task.completed => "completed",
        _ => "pending",
    };
    println!("Task {} marked {}", id, state);
    Ok(())
}

pub fn handle_delete<S: Store, N: Notifier, C: Clock>(tracker: &mut Tracker<S, N, C>, id: String) -> Result<(), CliError> {
    require_login(tracker)?;
    if !tracker.delete_task(&id)? {
        return Err(CliError::TaskNotFound(id));
    }
    println!("Task {} deleted", id);
    Ok(())
}

/// Turn list arguments into a query, filling the sort from config
pub fn build_query(args: ListArgs, config: &Config) -> Result<TaskQuery, CliError> {
    let start = args.from.as_deref().map(parse_due).transpose()?;
    let end = args.to.as_deref().map(parse_due).transpose()?;
    let date_range = if start.is_some() || end.is_some() {
        Some(DateRange {
            field: args.date_field,
            start,
            end,
        })
    } else {
        None
    };
    let sort_by = args.sort.unwrap_or(config.default_sort);
    Ok(TaskQuery {
        search: args.search.unwrap_or_default(),
        priority: args.priority.unwrap_or_default(),
        status: args.status.unwrap_or_default(),
        date_range,
        sort_by,
        order: args.order.unwrap_or_else(|| config.sort_order_for(sort_by)),
    })
}

pub fn handle_list<S: Store, N: Notifier, C: Clock>(
    tracker: &Tracker<S, N, C>,
    args: ListArgs,
    config: &Config,
) -> Result<(), CliError> {
    require_login(tracker)?;
    let query = build_query(args, config)?;
    let tasks = tracker.query(&query);
    let now = tracker.local_now();

    if tasks.is_empty() {
        println!("No tasks found");
    }
    for task in &tasks {
        println!("{}", format_task_line(task, now));
    }
    if query.is_filtered() {
        println!("Showing {} of {} tasks", tasks.len(), tracker.tasks().len());
    }
    Ok(())
}

pub fn handle_stats<S: Store, N: Notifier, C: Clock>(tracker: &Tracker<S, N, C>, config: &Config) -> Result<(), CliError> {
    require_login(tracker)?;
    let stats = tracker.stats(config.upcoming_window_days);
    println!("Total:     {}", stats.total);
    println!("Pending:   {}", stats.pending);
    println!("Completed: {}", stats.completed);
    println!("Important: {}", stats.important);
    println!("Overdue:   {}", stats.overdue);
    println!("Due soon:  {}", stats.upcoming);
    Ok(())
}

/// Default view when no subcommand is given
pub fn handle_dashboard<S: Store, N: Notifier, C: Clock>(tracker: &Tracker<S, N, C>, config: &Config) -> Result<(), CliError> {
    let user = tracker.current_user().ok_or(CliError::NotLoggedIn)?;
    println!("Welcome back, {}", user.name);
    handle_stats(tracker, config)?;
    println!();
    let query = TaskQuery {
        status: StatusFilter::Pending,
        ..TaskQuery::dashboard()
    };
    let now = tracker.local_now();
    for task in tracker.query(&query) {
        println!("{}", format_task_line(task, now));
    }
    Ok(())
}

pub fn handle_remind<S: Store, N: Notifier, C: Clock>(tracker: &mut Tracker<S, N, C>) -> Result<usize, CliError> {
    require_login(tracker)?;
    let fired = tracker.check_reminders()?;
    if fired == 0 && tracker.notifier().permission() != Permission::Granted {
        println!("Reminders are off. Run `studytrack notifications enable` to turn them on.");
    } else if fired == 0 {
        println!("No new reminders");
    }
    Ok(fired)
}

/// Handle the notifications command; permission changes are written back to config
pub fn handle_notifications<S: Store, N: Notifier, C: Clock>(
    tracker: &mut Tracker<S, N, C>,
    action: NotificationAction,
    config: &mut Config,
    config_path: &Path,
) -> Result<(), CliError> {
    match action {
        NotificationAction::Enable => {
            let permission = tracker.enable_notifications()?;
            config.notifications = permission;
            config.save_to_path(config_path)?;
            println!("Notifications {}", permission);
        }
        NotificationAction::Disable => {
            config.notifications = Permission::Denied;
            config.save_to_path(config_path)?;
            println!("Notifications denied");
        }
        NotificationAction::Status => {
            let sent = tracker
                .store()
                .keys_with_prefix("notified_")
                .map_err(TrackerError::from)?
                .len();
            println!("Notifications {} ({} reminders sent)", config.notifications, sent);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;
    use crate::store::MemoryStore;
    use crate::tracker::FixedClock;
    use chrono::NaiveDate;

    fn clock() -> FixedClock {
        FixedClock(
            NaiveDate::from_ymd_opt(2024, 4, 30)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
        )
    }

    #[test]
    fn commands_parse() {
        let cli = Cli::try_parse_from([
            "studytrack",
            "add",
            "Essay",
            "--description",
            "Draft",
            "--due",
            "2024-05-01",
            "--priority",
            "important",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Add { title, priority, .. }) => {
                assert_eq!(title, "Essay");
                assert_eq!(priority, Priority::Important);
            }
            _ => panic!("expected add command"),
        }

        let cli = Cli::try_parse_from(["studytrack", "--dev", "list", "--status", "pending", "--sort", "title"]).unwrap();
        assert!(cli.dev);
        assert!(matches!(cli.command, Some(Commands::List(ListArgs { status: Some(StatusFilter::Pending), sort: Some(SortBy::Title), .. }))));
    }

    #[test]
    fn build_query_uses_config_defaults() {
        let config = Config {
            default_sort: SortBy::Created,
            ..Config::default()
        };
        let query = build_query(ListArgs::default(), &config).unwrap();
        assert_eq!(query.sort_by, SortBy::Created);
        assert_eq!(query.order, SortOrder::Desc);
        assert!(query.date_range.is_none());

        let args = ListArgs {
            from: Some("2024-05-01".to_string()),
            date_field: DateField::Created,
            order: Some(SortOrder::Asc),
            ..Default::default()
        };
        let query = build_query(args, &config).unwrap();
        let range = query.date_range.unwrap();
        assert_eq!(range.field, DateField::Created);
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2024, 5, 1));
        assert_eq!(range.end, None);
        assert_eq!(query.order, SortOrder::Asc);
    }

    #[test]
    fn bad_dates_are_rejected() {
        let args = ListArgs {
            to: Some("tomorrow".to_string()),
            ..Default::default()
        };
        assert!(matches!(build_query(args, &Config::default()), Err(CliError::DateParseError(_))));
    }

    #[test]
    fn task_commands_need_login() {
        let store = MemoryStore::new();
        let mut tracker = Tracker::open_with_clock(&store, RecordingNotifier::granted(), clock()).unwrap();
        let result = handle_add(
            &mut tracker,
            "Essay".to_string(),
            "Draft".to_string(),
            "2024-05-01".to_string(),
            Priority::Normal,
        );
        assert!(matches!(result, Err(CliError::NotLoggedIn)));
    }

    #[test]
    fn handlers_drive_the_tracker() {
        let store = MemoryStore::new();
        let mut tracker = Tracker::open_with_clock(&store, RecordingNotifier::granted(), clock()).unwrap();
        handle_register(&mut tracker, "ada@uni.edu".into(), "pw".into(), "Ada".into(), None).unwrap();

        let task = handle_add(&mut tracker, "Essay".into(), "Draft".into(), "2024-05-03".into(), Priority::Normal).unwrap();
        handle_edit(&mut tracker, task.id.clone(), None, None, Some("2024-05-01".into()), None).unwrap();
        assert_eq!(tracker.notifier().sent.len(), 1);

        handle_toggle(&mut tracker, task.id.clone()).unwrap();
        assert!(tracker.task(&task.id).unwrap().completed);

        assert!(matches!(
            handle_delete(&mut tracker, "missing".into()),
            Err(CliError::TaskNotFound(_))
        ));
        handle_delete(&mut tracker, task.id).unwrap();
        assert!(tracker.tasks().is_empty());

        assert!(matches!(
            handle_register(&mut tracker, "ada@uni.edu".into(), "other".into(), "Eve".into(), None),
            Err(CliError::Rejected(_))
        ));
    }

    #[test]
    fn profile_keeps_unspecified_fields() {
        let store = MemoryStore::new();
        let mut tracker = Tracker::open_with_clock(&store, RecordingNotifier::granted(), clock()).unwrap();
        handle_register(&mut tracker, "ada@uni.edu".into(), "pw".into(), "Ada".into(), Some("Maths".into())).unwrap();

        handle_profile(&mut tracker, Some("Ada L.".into()), None, None, None, None).unwrap();
        let user = tracker.current_user().unwrap();
        assert_eq!(user.name, "Ada L.");
        assert_eq!(user.email, "ada@uni.edu");
        assert_eq!(user.department.as_deref(), Some("Maths"));
    }

    #[test]
    fn profile_clears_department_when_given_empty() {
        let store = MemoryStore::new();
        let mut tracker = Tracker::open_with_clock(&store, RecordingNotifier::granted(), clock()).unwrap();
        handle_register(&mut tracker, "ada@uni.edu".into(), "pw".into(), "Ada".into(), Some("Maths".into())).unwrap();

        handle_profile(&mut tracker, None, Some(String::new()), None, None, None).unwrap();
        assert_eq!(tracker.current_user().unwrap().department, None);
    }

    #[test]
    fn notification_permission_is_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();

        let store = MemoryStore::new();
        let notifier = RecordingNotifier::with_permission(Permission::Default);
        let mut tracker = Tracker::open_with_clock(&store, notifier, clock()).unwrap();

        handle_notifications(&mut tracker, NotificationAction::Enable, &mut config, &path).unwrap();
        assert_eq!(config.notifications, Permission::Granted);
        let saved = Config::load_from_path(&path, crate::utils::Profile::Dev).unwrap();
        assert_eq!(saved.notifications, Permission::Granted);

        handle_notifications(&mut tracker, NotificationAction::Disable, &mut config, &path).unwrap();
        let saved = Config::load_from_path(&path, crate::utils::Profile::Dev).unwrap();
        assert_eq!(saved.notifications, Permission::Denied);
    }
}
