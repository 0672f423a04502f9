mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sqlshift_config::{AppConfig, ConfigLoader};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sqlshift", version, about = "Versioned SQL schema migrations")]
struct Cli {
    /// Config file (YAML or TOML). Defaults to ./sqlshift.{yml,yaml,toml}.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database file, overrides the config file.
    #[arg(long, global = true, env = "SQLSHIFT_DATABASE")]
    database: Option<PathBuf>,

    /// Migrations folder, overrides the config file.
    #[arg(long, global = true, env = "SQLSHIFT_MIGRATIONS")]
    migrations: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG is set.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scaffold a new migration directory.
    New {
        /// Migration name, e.g. `createUsers`.
        name: String,
    },
    /// Apply every pending migration in version order.
    Up,
    /// Reverse the most recently applied migration.
    Down,
    /// List migrations and whether they are applied.
    Status,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    let config = resolve_config(&cli)?;

    match cli.command {
        Command::New { name } => commands::new_migration(&config, &name),
        Command::Up => commands::up(&config),
        Command::Down => commands::down(&config),
        Command::Status => commands::status(&config),
    }
}

fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => ConfigLoader::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ConfigLoader::discover(&std::env::current_dir()?)
            .context("failed to load config")?,
    };

    if let Some(database) = &cli.database {
        config.database = database.clone();
    }
    if let Some(migrations) = &cli.migrations {
        config.migrations_dir = migrations.clone();
    }

    config.validate()?;
    Ok(config)
}
