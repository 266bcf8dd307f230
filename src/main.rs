// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Modelyard CLI - offline project store for API data models

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use modelyard::commands::{self, Output, Session};
use modelyard::config;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "modelyard")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Configuration file path
    #[arg(short, long, env = "MODELYARD_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Data directory override
    #[arg(long, env = "MODELYARD_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, env = "NO_COLOR", global = true)]
    no_color: bool,

    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new project with an empty root module
    New {
        /// Project name
        name: String,

        /// Optional description
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Import exported graph dumps into a new project
    Import {
        /// Files or directories (searched for .json files)
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Import data type
        #[arg(short = 't', long = "type")]
        import_type: Option<String>,
    },

    /// List stored projects
    Recent {
        /// Page size
        #[arg(short, long)]
        limit: Option<usize>,

        /// Continue after this project id
        #[arg(long)]
        after: Option<String>,
    },

    /// Restore a project and print its root module
    Show {
        /// Project id
        id: String,
    },

    /// Rename a stored project
    Rename {
        /// Project id
        id: String,

        /// New name
        name: String,
    },

    /// Delete a stored project
    Delete {
        /// Project id
        id: String,
    },

    /// Print the effective configuration
    Config {
        /// Configuration key (omit to print everything)
        key: Option<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: clap_complete::Shell,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    // Initialize logging
    let log_level = match cli.verbose {
        0 if cli.quiet => tracing::Level::ERROR,
        0 => config.max_level()?,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(!cli.no_color)
        .with_target(false);
    match EnvFilter::try_from_default_env() {
        Ok(filter) => subscriber.with_env_filter(filter).init(),
        Err(_) => subscriber.with_max_level(log_level).init(),
    }

    let out = Output {
        json: cli.json,
        color: !cli.no_color,
    };

    // Execute command
    match cli.command {
        Commands::Config { key } => commands::config::run(&config, key.as_deref(), out),
        Commands::Completions { shell } => commands::completions::run(shell, &mut Cli::command()),
        command => {
            let session = Session::open(config).await?;
            match command {
                Commands::New { name, description } => {
                    commands::new::run(&session, &name, description.as_deref(), out).await
                }
                Commands::Import { paths, import_type } => {
                    commands::import::run(&session, &paths, import_type.as_deref(), out).await
                }
                Commands::Recent { limit, after } => commands::recent::run(&session, limit, after, out).await,
                Commands::Show { id } => commands::show::run(&session, &id, out).await,
                Commands::Rename { id, name } => commands::rename::run(&session, &id, &name, out).await,
                Commands::Delete { id } => commands::delete::run(&session, &id, out).await,
                Commands::Config { .. } | Commands::Completions { .. } => Ok(()),
            }
        }
    }
}
