use anyhow::{anyhow, Result};
use clap::ValueEnum;
use serde_json::Map;
use tumble_client::{
    ApiClient, DocumentCreateRequest, DocumentSourceType, DocumentStatus, FeedbackRequest,
};

use crate::{DocsCommand, SessionsCommand};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum CliDocumentStatus {
    Pending,
    Processing,
    Ready,
    Error,
}

impl From<CliDocumentStatus> for DocumentStatus {
    fn from(status: CliDocumentStatus) -> Self {
        match status {
            CliDocumentStatus::Pending => Self::Pending,
            CliDocumentStatus::Processing => Self::Processing,
            CliDocumentStatus::Ready => Self::Ready,
            CliDocumentStatus::Error => Self::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum CliDocumentSourceType {
    Markdown,
    Pdf,
    Web,
    Docx,
}

impl From<CliDocumentSourceType> for DocumentSourceType {
    fn from(source_type: CliDocumentSourceType) -> Self {
        match source_type {
            CliDocumentSourceType::Markdown => Self::Markdown,
            CliDocumentSourceType::Pdf => Self::Pdf,
            CliDocumentSourceType::Web => Self::Web,
            CliDocumentSourceType::Docx => Self::Docx,
        }
    }
}

pub(crate) async fn run_sessions(client: &ApiClient, command: SessionsCommand) -> Result<()> {
    match command {
        SessionsCommand::List { limit } => {
            let sessions = client.list_sessions(limit).await?;
            if sessions.is_empty() {
                println!("no sessions");
                return Ok(());
            }
            for session in sessions {
                println!(
                    "{}  {}  {}",
                    session.id,
                    session.updated_at.format("%Y-%m-%d %H:%M"),
                    session.title.as_deref().unwrap_or("(untitled)")
                );
            }
        }
        SessionsCommand::Create => {
            let session = client.create_session().await?;
            println!("{}", session.id);
        }
        SessionsCommand::Show { session_id } => {
            let detail = client.get_session(&session_id).await?;
            println!(
                "{}  {}",
                detail.session.id,
                detail.session.title.as_deref().unwrap_or("(untitled)")
            );
            for message in detail.messages {
                let tier = message
                    .confidence_tier
                    .map(|tier| format!(" [{tier}]"))
                    .unwrap_or_default();
                println!("{}{tier}: {}", message.role, message.content);
            }
        }
        SessionsCommand::Delete { session_id } => {
            client.delete_session(&session_id).await?;
            println!("deleted {session_id}");
        }
    }
    Ok(())
}

pub(crate) async fn run_docs(client: &ApiClient, command: DocsCommand) -> Result<()> {
    match command {
        DocsCommand::List { status } => {
            let documents = client.list_documents(status.map(Into::into)).await?;
            if documents.is_empty() {
                println!("no documents");
                return Ok(());
            }
            for document in documents {
                println!(
                    "{}  {:<10}  {:>5} chunks  {}",
                    document.id, document.status, document.chunk_count, document.title
                );
                if let Some(error) = document.error_message {
                    println!("    error: {error}");
                }
            }
        }
        DocsCommand::Upload { file } => {
            let file_name = file
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or_else(|| anyhow!("file path has no usable name: {}", file.display()))?
                .to_string();
            let content = tokio::fs::read(&file).await?;
            let document = client.upload_document(&file_name, content).await?;
            println!("{}  {}", document.id, document.status);
        }
        DocsCommand::Add {
            title,
            source_uri,
            source_type,
        } => {
            let document = client
                .create_document(&DocumentCreateRequest {
                    title,
                    source_type: source_type.into(),
                    source_uri,
                    metadata: Map::new(),
                })
                .await?;
            println!("{}  {}", document.id, document.status);
        }
        DocsCommand::Status { document_id } => {
            let status = client.ingestion_status(&document_id).await?;
            println!("{}  {}  {} chunks", status.document_id, status.status, status.chunk_count);
            if let Some(error) = status.error_message {
                println!("error: {error}");
            }
        }
        DocsCommand::Delete { document_id } => {
            client.delete_document(&document_id).await?;
            println!("deleted {document_id}");
        }
    }
    Ok(())
}

pub(crate) async fn run_feedback(
    client: &ApiClient,
    message_id: String,
    rating: i32,
    comment: Option<String>,
) -> Result<()> {
    client
        .submit_feedback(&FeedbackRequest {
            message_id,
            rating,
            comment,
        })
        .await?;
    println!("feedback recorded");
    Ok(())
}
