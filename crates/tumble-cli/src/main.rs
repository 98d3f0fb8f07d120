mod admin;
mod chat;
mod probe;

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use tumble_client::{ApiClient, ApiClientConfig};

use crate::admin::{CliDocumentSourceType, CliDocumentStatus};

#[derive(Debug, Parser)]
#[command(
    name = "tumble",
    about = "Terminal client for a streaming retrieval-augmented chat service",
    version
)]
struct Cli {
    #[arg(
        long,
        env = "TUMBLE_API_BASE",
        default_value = "http://localhost:8000/api/v1",
        help = "Base URL of the chat service API, including the version prefix"
    )]
    api_base: String,

    #[arg(
        long = "connect-timeout-ms",
        env = "TUMBLE_CONNECT_TIMEOUT_MS",
        default_value_t = 10_000,
        help = "TCP connect timeout in milliseconds"
    )]
    connect_timeout_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive chat; Ctrl-C stops the answer in flight, "exit" quits
    Chat,
    /// Run the scripted probe battery and grade the confidence tiers
    Probe {
        #[arg(long, help = "Run only the probe with this question id")]
        id: Option<String>,

        #[arg(long, default_value_t = false, help = "Emit results as JSON instead of a table")]
        json: bool,
    },
    /// Inspect and manage conversation sessions
    Sessions {
        #[command(subcommand)]
        command: SessionsCommand,
    },
    /// Manage knowledge-base documents
    Docs {
        #[command(subcommand)]
        command: DocsCommand,
    },
    /// Rate an assistant message
    Feedback {
        message_id: String,

        #[arg(help = "1 for helpful, -1 for unhelpful", allow_hyphen_values = true)]
        rating: i32,

        comment: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
enum SessionsCommand {
    /// List recent sessions
    List {
        #[arg(long, help = "Maximum number of sessions to return")]
        limit: Option<u32>,
    },
    /// Create an empty session
    Create,
    /// Show one session with its message history
    Show { session_id: String },
    /// Delete a session
    Delete { session_id: String },
}

#[derive(Debug, Subcommand)]
enum DocsCommand {
    /// List knowledge-base documents
    List {
        #[arg(long, value_enum, help = "Only documents in this ingestion state")]
        status: Option<CliDocumentStatus>,
    },
    /// Upload a local Markdown or PDF file for ingestion
    Upload {
        file: std::path::PathBuf,
    },
    /// Register a document for ingestion by URL or path
    Add {
        title: String,

        #[arg(help = "Where the document lives, e.g. a path or URL")]
        source_uri: String,

        #[arg(long, value_enum, default_value_t = CliDocumentSourceType::Markdown)]
        source_type: CliDocumentSourceType,
    },
    /// Show ingestion progress for a document
    Status { document_id: String },
    /// Delete a document and its chunks
    Delete { document_id: String },
}

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

async fn run_cli(cli: Cli) -> Result<()> {
    let client = Arc::new(ApiClient::new(ApiClientConfig {
        api_base: cli.api_base,
        connect_timeout_ms: cli.connect_timeout_ms,
    })?);

    match cli.command {
        Command::Chat => chat::run(client).await,
        Command::Probe { id, json } => probe::run(client, id.as_deref(), json).await,
        Command::Sessions { command } => admin::run_sessions(&client, command).await,
        Command::Docs { command } => admin::run_docs(&client, command).await,
        Command::Feedback {
            message_id,
            rating,
            comment,
        } => admin::run_feedback(&client, message_id, rating, comment).await,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    run_cli(cli).await
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Command};

    #[test]
    fn probe_flags_parse() {
        let cli = Cli::parse_from(["tumble", "probe", "--id", "lint-trap", "--json"]);
        match cli.command {
            Command::Probe { id, json } => {
                assert_eq!(id.as_deref(), Some("lint-trap"));
                assert!(json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn feedback_accepts_a_negative_rating() {
        let cli = Cli::parse_from(["tumble", "feedback", "msg-7", "-1"]);
        match cli.command {
            Command::Feedback {
                message_id,
                rating,
                comment,
            } => {
                assert_eq!(message_id, "msg-7");
                assert_eq!(rating, -1);
                assert_eq!(comment, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn api_base_defaults_to_the_local_backend() {
        let cli = Cli::parse_from(["tumble", "chat"]);
        assert_eq!(cli.api_base, "http://localhost:8000/api/v1");
        assert_eq!(cli.connect_timeout_ms, 10_000);
    }
}
