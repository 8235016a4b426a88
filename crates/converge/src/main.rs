// SPDX-FileCopyrightText: 2026 Converge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Converge - a quota-budgeted relay bridging Discord and LINE.
//!
//! This is the binary entry point for operator commands: quota and queue
//! inspection plus configuration tooling. The relay itself is embedded by
//! platform adapter processes through the `converge-relay` crate.

mod queue;
mod status;

use clap::{Parser, Subcommand};

/// Converge - a quota-budgeted relay bridging Discord and LINE.
#[derive(Parser, Debug)]
#[command(name = "converge", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Show quota standing and overflow queue depth.
    Status {
        /// Output structured JSON for scripting.
        #[arg(long)]
        json: bool,
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
    /// Inspect the overflow message queue.
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },
    /// Manage Converge configuration.
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum QueueCommands {
    /// List the oldest pending messages.
    List {
        /// Maximum number of entries to show.
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Validate the configuration and report diagnostics.
    Validate,
    /// Print the fully resolved configuration as TOML.
    Show,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load and validate configuration at startup
    let config = match converge_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            converge_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.relay.log_level);

    let result = match cli.command {
        Some(Commands::Status { json, plain }) => status::run_status(&config, json, plain).await,
        Some(Commands::Queue {
            command: QueueCommands::List { limit },
        }) => queue::run_list(&config, limit).await,
        Some(Commands::Config {
            command: ConfigCommands::Validate,
        }) => {
            println!("configuration OK (relay.name={})", config.relay.name);
            Ok(())
        }
        Some(Commands::Config {
            command: ConfigCommands::Show,
        }) => show_config(&config),
        None => {
            println!("converge: use --help for available commands");
            Ok(())
        }
    };

    if let Err(err) = result {
        eprintln!("converge: {err}");
        std::process::exit(1);
    }
}

/// Print the fully resolved configuration, compiled defaults included.
fn show_config(
    config: &converge_config::ConvergeConfig,
) -> Result<(), converge_core::ConvergeError> {
    let rendered = toml::to_string_pretty(config).map_err(|e| {
        converge_core::ConvergeError::Internal(format!("config serialization failed: {e}"))
    })?;
    print!("{rendered}");
    Ok(())
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{log_level},refinery_core=warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
