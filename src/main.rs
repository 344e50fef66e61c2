use clap::Parser;
use color_eyre::Result;
use studytrack::{
    Config, Profile, SqliteStore, Tracker,
    cli::{self, Cli, Commands},
    notify::TerminalNotifier,
};

fn init_logging(config: &Config) {
    let level = config
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::WARN);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    // Set up error reporting with color-eyre
    color_eyre::install()?;

    let cli = Cli::parse();

    // Determine profile: --dev flag enables dev mode, otherwise use prod
    let profile = if cli.dev { Profile::Dev } else { Profile::Prod };

    let config_path = match cli.config {
        Some(ref path) => studytrack::utils::expand_path(path),
        None => Config::get_config_path(profile)?,
    };
    let mut config = Config::load_from_path(&config_path, profile)?;
    init_logging(&config);

    let store = SqliteStore::open(config.get_database_path())?;
    let notifier = TerminalNotifier::stdout(config.notifications);
    let mut tracker = Tracker::open(store, notifier)?;

    // Dispatch to appropriate command handler
    match cli.command {
        None => cli::handle_dashboard(&tracker, &config)?,
        Some(Commands::Register { email, password, name, department }) => {
            cli::handle_register(&mut tracker, email, password, name, department)?;
        }
        Some(Commands::Login { email, password }) => {
            cli::handle_login(&mut tracker, email, password)?;
        }
        Some(Commands::Logout) => cli::handle_logout(&mut tracker)?,
        Some(Commands::Whoami) => cli::handle_whoami(&tracker)?,
        Some(Commands::Profile { name, department, email, current_password, new_password }) => {
            cli::handle_profile(&mut tracker, name, department, email, current_password, new_password)?;
        }
        Some(Commands::Add { title, description, due, priority }) => {
            cli::handle_add(&mut tracker, title, description, due, priority)?;
        }
        Some(Commands::Edit { id, title, description, due, priority }) => {
            cli::handle_edit(&mut tracker, id, title, description, due, priority)?;
        }
        Some(Commands::Toggle { id }) => cli::handle_toggle(&mut tracker, id)?,
        Some(Commands::Delete { id }) => cli::handle_delete(&mut tracker, id)?,
        Some(Commands::List(args)) => cli::handle_list(&tracker, args, &config)?,
        Some(Commands::Stats) => cli::handle_stats(&tracker, &config)?,
        Some(Commands::Remind) => {
            cli::handle_remind(&mut tracker)?;
        }
        Some(Commands::Notifications { action }) => {
            cli::handle_notifications(&mut tracker, action, &mut config, &config_path)?;
        }
    }

    Ok(())
}
