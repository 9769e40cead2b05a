use anyhow::Result;
use clap::{Parser, Subcommand};
use rag_assistant::commands::{ask, chat, ingest, show_status};
use rag_assistant::config::{Config, get_config_dir, run_interactive_config, show_config};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "rag-assistant")]
#[command(about = "A retrieval-augmented chat assistant over a markdown knowledge base")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Ask a single question (the default when no command is given)
    Ask {
        /// Question to ask; prompts for one when omitted
        #[arg(long)]
        query: Option<String>,
    },
    /// Chunk, embed and store the source document
    Ingest {
        /// Markdown document to ingest instead of the configured one
        #[arg(long)]
        document: Option<PathBuf>,
    },
    /// Start an interactive chat session
    Chat,
    /// Configure models, vector store and chunking
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Show configuration summary and vector store status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_dir = get_config_dir()?;

    match cli.command.unwrap_or(Commands::Ask { query: None }) {
        Commands::Config { show } => {
            if show {
                show_config(&Config::load(&config_dir)?)?;
            } else {
                run_interactive_config(&config_dir)?;
            }
        }
        Commands::Ask { query } => {
            ask(&Config::load(&config_dir)?, query).await?;
        }
        Commands::Ingest { document } => {
            ingest(&Config::load(&config_dir)?, document).await?;
        }
        Commands::Chat => {
            chat(&Config::load(&config_dir)?).await?;
        }
        Commands::Status => {
            show_status(&Config::load(&config_dir)?).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn no_subcommand_defaults_to_ask() {
        let cli = Cli::try_parse_from(["rag-assistant"]).expect("should parse");
        assert!(cli.command.is_none());
    }

    #[test]
    fn ask_with_query() {
        let cli = Cli::try_parse_from(["rag-assistant", "ask", "--query", "What is DACA?"])
            .expect("should parse");

        assert!(matches!(
            cli.command,
            Some(Commands::Ask { query: Some(ref q) }) if q == "What is DACA?"
        ));
    }

    #[test]
    fn ask_without_query() {
        let cli = Cli::try_parse_from(["rag-assistant", "ask"]).expect("should parse");
        assert!(matches!(cli.command, Some(Commands::Ask { query: None })));
    }

    #[test]
    fn ingest_with_document() {
        let cli = Cli::try_parse_from(["rag-assistant", "ingest", "--document", "guide.md"])
            .expect("should parse");

        assert!(matches!(
            cli.command,
            Some(Commands::Ingest { document: Some(ref path) }) if path == &PathBuf::from("guide.md")
        ));
    }

    #[test]
    fn chat_and_status_commands() {
        let chat = Cli::try_parse_from(["rag-assistant", "chat"]).expect("should parse");
        assert!(matches!(chat.command, Some(Commands::Chat)));

        let status = Cli::try_parse_from(["rag-assistant", "status"]).expect("should parse");
        assert!(matches!(status.command, Some(Commands::Status)));
    }

    #[test]
    fn config_show_flag() {
        let cli = Cli::try_parse_from(["rag-assistant", "config", "--show"]).expect("should parse");
        assert!(matches!(cli.command, Some(Commands::Config { show: true })));
    }

    #[test]
    fn invalid_command() {
        let err = Cli::try_parse_from(["rag-assistant", "invalid"]).expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
    }

    #[test]
    fn help_message() {
        let err = Cli::try_parse_from(["rag-assistant", "--help"]).expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
    }
}
