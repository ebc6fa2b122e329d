//! hotspot-assignee - assign SonarQube security hotspots from the terminal
//!
//! Opens a search-as-you-type picker over the server's user directory and
//! assigns (or unassigns) the chosen hotspot.

mod api;
mod app;
mod config;
mod error;
mod events;
mod logging;
mod tasks;
mod ui;

use std::io::{self, BufRead, Stdout};

use clap::{Parser, Subcommand};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{error, info, warn};

use crate::api::auth;
use crate::app::App;
use crate::config::{Config, ConfigError, Profile};
use crate::error::{AppError, Result};
use crate::events::EventHandler;
use crate::tasks::create_task_channel;

/// Environment variable that overrides the keyring token.
const TOKEN_ENV_VAR: &str = "SONAR_TOKEN";

/// Profile name used when only `--url` is given.
const ADHOC_PROFILE: &str = "adhoc";

#[derive(Debug, Parser)]
#[command(name = "hotspot-assignee", version, about)]
struct Cli {
    /// Write debug-level logs.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Pick an assignee for a security hotspot.
    Assign {
        /// Key of the hotspot to assign.
        hotspot: String,
        /// Profile from config.toml to use.
        #[arg(long)]
        profile: Option<String>,
        /// Server URL, bypassing config.toml.
        #[arg(long)]
        url: Option<String>,
    },
    /// Store a user token for a profile in the OS keyring (read from stdin).
    Login {
        /// Profile name the token belongs to.
        #[arg(long)]
        profile: Option<String>,
        /// Server URL; saves the profile to config.toml.
        #[arg(long)]
        url: Option<String>,
    },
    /// Remove the stored token for a profile.
    Logout {
        /// Profile name the token belongs to.
        #[arg(long)]
        profile: Option<String>,
    },
}

type Tui = Terminal<CrosstermBackend<Stdout>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.debug)?;

    let outcome = run(cli);
    if let Err(e) = &outcome {
        if e.is_critical() {
            error!("{}", e);
        } else {
            warn!("{}", e);
        }
        eprintln!("Error: {}", e.user_message());
        if let Some(action) = e.suggested_action() {
            eprintln!("{}", action);
        } else if e.is_recoverable() {
            eprintln!("This may be temporary; try the command again.");
        }
        if let Some(dir) = logging::log_directory() {
            eprintln!("Logs: {}", dir.display());
        }
    }

    logging::shutdown();
    if outcome.is_err() {
        std::process::exit(1);
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;

    match cli.command {
        Command::Assign {
            hotspot,
            profile,
            url,
        } => {
            let profile = resolve_profile(&config, profile.as_deref(), url.as_deref())?;
            run_picker(&config, profile, env_token(), hotspot)
        }
        Command::Login { profile, url } => {
            let mut config = config;
            let name = match url {
                Some(url) => {
                    let name = profile.unwrap_or_else(|| ADHOC_PROFILE.to_string());
                    config.upsert_profile(Profile::new(name.clone(), url))?;
                    config.save()?;
                    info!(profile = %name, "Saved profile");
                    name
                }
                None => profile_name(&config, profile)?,
            };
            if auth::has_token(&name) {
                println!("Replacing stored token for '{}'.", name);
            }
            println!("Paste the user token for '{}' and press Enter:", name);
            let mut token = String::new();
            io::stdin().lock().read_line(&mut token)?;
            let token = token.trim();
            if token.is_empty() {
                return Err(AppError::other("No token given"));
            }
            auth::store_token(&name, token)?;
            info!(profile = %name, "Stored token");
            println!("Token stored.");
            Ok(())
        }
        Command::Logout { profile } => {
            let name = profile_name(&config, profile)?;
            auth::delete_token(&name)?;
            info!(profile = %name, "Deleted token");
            println!("Token removed for '{}'.", name);
            Ok(())
        }
    }
}

/// Pick the profile to connect with.
///
/// `--url` wins and builds an ad-hoc profile, then `--profile`, then the
/// configured default.
fn resolve_profile(config: &Config, name: Option<&str>, url: Option<&str>) -> Result<Profile> {
    let profile = match (url, name) {
        (Some(url), name) => Profile::new(
            name.unwrap_or(ADHOC_PROFILE).to_string(),
            url.to_string(),
        ),
        (None, Some(name)) => config.get_profile(name)?.clone(),
        (None, None) => config
            .get_default_profile()
            .cloned()
            .ok_or_else(|| ConfigError::ProfileNotFound("default".to_string()))?,
    };
    profile.validate()?;
    Ok(profile)
}

/// Token from the environment, ignoring blank values.
fn env_token() -> Option<String> {
    std::env::var(TOKEN_ENV_VAR)
        .ok()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

fn profile_name(config: &Config, name: Option<String>) -> Result<String> {
    match name {
        Some(name) => Ok(name),
        None => config
            .get_default_profile()
            .map(|p| p.name.clone())
            .ok_or_else(|| ConfigError::ProfileNotFound("default".to_string()).into()),
    }
}

fn run_picker(
    config: &Config,
    profile: Profile,
    token: Option<String>,
    hotspot: String,
) -> Result<()> {
    info!(profile = %profile.name, hotspot = %hotspot, "Starting picker");

    let (mut rx, spawner) = create_task_channel();
    spawner.spawn_connect(profile, token, config.settings.page_size);
    let mut app = App::new(hotspot, &config.settings, spawner);
    let events = EventHandler::with_tick_rate(config.settings.tick_rate_ms);

    let mut terminal = setup_terminal()?;
    let result = (|| -> Result<()> {
        while !app.should_quit() {
            terminal.draw(|frame| app.view(frame))?;
            app.update(events.next()?);
            while let Ok(message) = rx.try_recv() {
                app.handle_message(message);
            }
        }
        Ok(())
    })();
    restore_terminal(&mut terminal)?;

    if let Some(login) = app.current_assignee() {
        println!("Assignee: {}", login);
    }
    result
}

fn setup_terminal() -> Result<Tui> {
    enable_raw_mode().map_err(|e| AppError::terminal(e.to_string()))?;
    execute!(io::stdout(), EnterAlternateScreen)?;
    Terminal::new(CrosstermBackend::new(io::stdout())).map_err(AppError::from)
}

fn restore_terminal(terminal: &mut Tui) -> Result<()> {
    disable_raw_mode().map_err(|e| AppError::terminal(e.to_string()))?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}
