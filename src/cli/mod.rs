pub mod commands;
pub mod config;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::cli::config::Context;

#[derive(Parser)]
#[command(name = "dash")]
#[command(about = "Admin dashboard CLI - sessions, users, notifications and settings against the hosted backend")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Check that the backend is reachable")]
    Health,

    #[command(about = "Sign in, sign out and manage the current identity")]
    Auth {
        #[command(subcommand)]
        cmd: commands::auth::AuthCommands,
    },

    #[command(about = "User profile management")]
    Users {
        #[command(subcommand)]
        cmd: commands::users::UserCommands,
    },

    #[command(about = "Notification inbox")]
    Notifications {
        #[command(subcommand)]
        cmd: commands::notifications::NotificationCommands,
    },

    #[command(about = "Dashboard counters")]
    Stats,

    #[command(about = "Local application settings")]
    Settings {
        #[command(subcommand)]
        cmd: commands::settings::SettingsCommands,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let ctx = Context::open(crate::config::config())?;

    match cli.command {
        Commands::Health => commands::health::handle(&ctx, output_format).await,
        Commands::Auth { cmd } => commands::auth::handle(cmd, &ctx, output_format).await,
        Commands::Users { cmd } => commands::users::handle(cmd, &ctx, output_format).await,
        Commands::Notifications { cmd } => commands::notifications::handle(cmd, &ctx, output_format).await,
        Commands::Stats => commands::stats::handle(&ctx, output_format).await,
        Commands::Settings { cmd } => commands::settings::handle(cmd, &ctx, output_format).await,
    }
}
