// SPDX-FileCopyrightText: 2026 Snapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Snapline - a LINE-to-Google-Drive photo relay.
//!
//! This is the binary entry point for the Snapline relay server.

use clap::{Parser, Subcommand};

mod serve;

/// Snapline - a LINE-to-Google-Drive photo relay.
#[derive(Parser, Debug)]
#[command(name = "snapline", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the webhook relay server.
    Serve,
    /// Apply pending database migrations and exit.
    Migrate,
    /// Print the resolved configuration as TOML.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match snapline_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            snapline_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::Migrate) => {
            // Opening the database applies embedded migrations.
            match snapline_storage::Database::open(&config.storage.database_path).await {
                Ok(db) => {
                    if let Err(e) = db.close().await {
                        eprintln!("error: {e}");
                        std::process::exit(1);
                    }
                    println!("migrations applied: {}", config.storage.database_path);
                }
                Err(e) => {
                    eprintln!("error: {e}");
                    std::process::exit(1);
                }
            }
        }
        Some(Commands::Config) => match toml::to_string_pretty(&config) {
            Ok(rendered) => print!("{rendered}"),
            Err(e) => {
                eprintln!("error: failed to render config: {e}");
                std::process::exit(1);
            }
        },
        None => {
            println!("snapline: use --help for available commands");
        }
    }
}
