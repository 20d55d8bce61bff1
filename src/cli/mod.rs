pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::config;
use crate::database::DatabaseManager;
use crate::server::AppState;

#[derive(Parser)]
#[command(name = "dyntables")]
#[command(about = "dyntables CLI - local administration of the dynamic tables service")]
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
    #[command(about = "Apply pending database migrations")]
    Migrate,

    #[command(about = "User (tenant) management")]
    User {
        #[command(subcommand)]
        cmd: commands::user::UserCommands,
    },

    #[command(about = "API token management")]
    Token {
        #[command(subcommand)]
        cmd: commands::token::TokenCommands,
    },

    #[command(about = "Insert generated dummy rows into a table")]
    Generate(commands::generate::GenerateArgs),

    #[command(about = "Run the HTTP server")]
    Serve {
        #[arg(long, help = "Port to listen on (defaults to the configured port)")]
        port: Option<u16>,
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

/// Connect to the configured database (migrating it) and build the same
/// state the server uses
pub async fn open_state() -> anyhow::Result<AppState> {
    let config = config();
    let pool = DatabaseManager::connect_and_migrate(&config.database.url, config.database.max_connections).await?;
    Ok(AppState::new(pool, Arc::new(config.clone())))
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Migrate => commands::migrate::handle(output_format).await,
        Commands::User { cmd } => commands::user::handle(cmd, output_format).await,
        Commands::Token { cmd } => commands::token::handle(cmd, output_format).await,
        Commands::Generate(args) => commands::generate::handle(args, output_format).await,
        Commands::Serve { port } => commands::serve::handle(port).await,
    }
}
