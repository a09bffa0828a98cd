//! OfferDesk CLI: the main entry point.
//!
//! Commands:
//! - `init`: write the default config
//! - `chat`: talk to the desk as a given user (interactive or single message)
//! - `history`: show a user's stored conversation
//! - `tools`: print the tool catalog advertised to the model
//! - `doctor`: diagnose configuration, storage and provider access

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "offerdesk",
    about = "OfferDesk — quote desk assistant",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Chat with the desk
    Chat {
        /// The end user to act as
        #[arg(short, long, default_value = "cli-user")]
        user: String,

        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Show a user's stored conversation
    History {
        #[arg(short, long, default_value = "cli-user")]
        user: String,

        /// Number of most recent turns to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Print the tool catalog
    Tools {
        /// Print the declarations as JSON schemas
        #[arg(long)]
        json: bool,
    },

    /// Diagnose system health
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init { force } => commands::init::run(force).await?,
        Commands::Chat { user, message } => commands::chat::run(user, message).await?,
        Commands::History { user, limit } => commands::history::run(user, limit).await?,
        Commands::Tools { json } => commands::tools::run(json)?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn chat_defaults() {
        let cli = Cli::try_parse_from(["offerdesk", "chat", "-m", "hello"]).unwrap();
        match cli.command {
            Commands::Chat { user, message } => {
                assert_eq!(user, "cli-user");
                assert_eq!(message.as_deref(), Some("hello"));
            }
            _ => panic!("expected chat"),
        }
    }

    #[test]
    fn history_limit_parses() {
        let cli = Cli::try_parse_from(["offerdesk", "history", "--user", "u7", "--limit", "5", "-v"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::History { limit: 5, .. }));
    }
}
