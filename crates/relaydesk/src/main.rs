// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! relaydesk - operator console for the support desk.
//!
//! This is the binary entry point and composition root: every collaborator
//! instance is created here and handed to the sync engine.

mod commands;
mod console;
mod shutdown;
mod watch;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use relaydesk_config::RelayDeskConfig;
use relaydesk_core::types::{ConversationId, ConversationStatus, OperatorId};

/// relaydesk - operator console for the support desk.
#[derive(Parser, Debug)]
#[command(name = "relaydesk", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the XDG hierarchy.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Connect and follow live events until Ctrl+C.
    Watch,
    /// Manage the stored bearer token.
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
    /// Send a message into a conversation.
    Send {
        conversation: ConversationId,
        text: String,
    },
    /// Assign a conversation to an operator.
    Assign {
        conversation: ConversationId,
        operator: OperatorId,
    },
    /// Close a conversation.
    Close { conversation: ConversationId },
    /// Mark every message of a conversation as read.
    MarkRead { conversation: ConversationId },
    /// Change the status of a conversation (waiting, active, closed).
    Status {
        conversation: ConversationId,
        status: ConversationStatus,
    },
}

#[derive(Subcommand, Debug)]
enum TokenAction {
    /// Store a bearer token.
    Set { token: String },
    /// Forget the stored token.
    Clear,
}

fn load_config(path: Option<&std::path::Path>) -> Option<RelayDeskConfig> {
    let loaded = match path {
        Some(path) => relaydesk_config::load_and_validate_path(path),
        None => relaydesk_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => Some(config),
        Err(errors) => {
            relaydesk_config::render_errors(&errors);
            None
        }
    }
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("relaydesk={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let Some(config) = load_config(cli.config.as_deref()) else {
        return ExitCode::FAILURE;
    };
    init_tracing(&config.console.log_level);

    let result = match cli.command {
        Commands::Watch => watch::run_watch(&config).await,
        Commands::Token { action } => match action {
            TokenAction::Set { token } => commands::run_token_set(&config, token),
            TokenAction::Clear => commands::run_token_clear(&config),
        },
        Commands::Send { conversation, text } => {
            commands::run_mutation(&config, commands::Mutation::Send { conversation, text }).await
        }
        Commands::Assign {
            conversation,
            operator,
        } => {
            commands::run_mutation(
                &config,
                commands::Mutation::Assign {
                    conversation,
                    operator,
                },
            )
            .await
        }
        Commands::Close { conversation } => {
            commands::run_mutation(&config, commands::Mutation::Close { conversation }).await
        }
        Commands::MarkRead { conversation } => {
            commands::run_mutation(&config, commands::Mutation::MarkRead { conversation }).await
        }
        Commands::Status {
            conversation,
            status,
        } => {
            commands::run_mutation(
                &config,
                commands::Mutation::Status {
                    conversation,
                    status,
                },
            )
            .await
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
