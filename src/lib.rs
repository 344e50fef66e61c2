pub mod auth;
pub mod cli;
pub mod config;
pub mod models;
pub mod notify;
pub mod query;
pub mod stats;
pub mod store;
pub mod tasks;
pub mod tracker;
pub mod utils;

pub use config::Config;
pub use models::{NewTask, Priority, Task, TaskUpdate, User};
pub use store::{MemoryStore, SqliteStore, Store};
pub use tracker::Tracker;
pub use utils::Profile;
