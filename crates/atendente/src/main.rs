// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Atendente - messaging automation with retrieval-augmented replies.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod calendar;
mod gateway;
mod kb;
mod pairing;
mod serve;
mod sessions;
mod telemetry;

use std::path::PathBuf;

use atendente_config::model::AtendenteConfig;
use clap::{Parser, Subcommand};

/// Atendente - messaging automation with retrieval-augmented replies.
#[derive(Parser, Debug)]
#[command(name = "atendente", version, about, long_about = None)]
struct Cli {
    /// Load configuration from this file instead of the standard locations.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the service: sessions, automation and the HTTP gateway.
    Serve,
    /// Validate configuration and print the effective settings.
    CheckConfig,
    /// Manage tenant knowledge bases.
    Kb {
        #[command(subcommand)]
        action: KbCommand,
    },
    /// List sessions with stored credentials.
    Sessions,
}

#[derive(Subcommand, Debug)]
enum KbCommand {
    /// Ingest a text file into the tenant's knowledge base.
    Add {
        tenant: String,
        file: PathBuf,
        /// Document title (defaults to the file name).
        #[arg(long)]
        title: Option<String>,
    },
    /// List the tenant's documents and their ingestion status.
    List { tenant: String },
    /// Delete a document and its chunks.
    Remove { document_id: String },
}

fn load_config(path: Option<&PathBuf>) -> AtendenteConfig {
    let loaded = match path {
        Some(path) => atendente_config::load_and_validate_path(path),
        None => atendente_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            atendente_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::CheckConfig) => {
            print_config_summary(&config);
            Ok(())
        }
        Some(Commands::Kb { action }) => match action {
            KbCommand::Add {
                tenant,
                file,
                title,
            } => kb::run_add(&config, &tenant, &file, title.as_deref()).await,
            KbCommand::List { tenant } => kb::run_list(&config, &tenant).await,
            KbCommand::Remove { document_id } => kb::run_remove(&config, &document_id).await,
        },
        Some(Commands::Sessions) => sessions::run_sessions(&config).await,
        None => {
            println!("atendente: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn print_config_summary(config: &AtendenteConfig) {
    println!("configuration is valid");
    println!("  agent.name              = {}", config.agent.name);
    println!("  storage.database_path   = {}", config.storage.database_path);
    println!("  gemini.model            = {}", config.gemini.model);
    println!("  gemini.max_retries      = {}", config.gemini.max_retries);
    println!("  transport.bridge_url    = {}", config.transport.bridge_url);
    println!(
        "  automation.pause_window = {}s",
        config.automation.pause_window_secs
    );
    println!(
        "  automation.hours        = {}",
        if config.automation.business_hours.is_some() {
            "configured"
        } else {
            "always open"
        }
    );
    println!(
        "  delivery.max_segment    = {} chars",
        config.delivery.max_segment_length
    );
    println!("  knowledge.top_k         = {}", config.knowledge.top_k);
    println!(
        "  gateway                 = {}",
        if config.gateway.enabled {
            format!("{}:{}", config.gateway.host, config.gateway.port)
        } else {
            "disabled".to_string()
        }
    );
}
