use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tumble_chat::{ChatSession, SendOutcome, TurnOutcome};
use tumble_client::ApiClient;
use tumble_protocol::ProtocolEvent;

/// Interactive single-conversation loop over stdin/stdout.
pub(crate) async fn run(client: Arc<ApiClient>) -> Result<()> {
    let session = Arc::new(ChatSession::new(client));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Type a question; Ctrl-C stops a streaming answer; \"exit\" quits.");
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if text == "exit" || text == "quit" {
            break;
        }
        stream_turn(&session, text).await;
    }
    Ok(())
}

async fn stream_turn(session: &Arc<ChatSession>, text: &str) {
    let send = session.send_with(text, |_, event| {
        if let ProtocolEvent::Delta { content } = event {
            print!("{content}");
            let _ = std::io::stdout().flush();
        }
    });
    tokio::pin!(send);

    let outcome = loop {
        tokio::select! {
            outcome = &mut send => break outcome,
            signal = tokio::signal::ctrl_c() => {
                if signal.is_ok() {
                    session.stop();
                }
            }
        }
    };

    match outcome {
        SendOutcome::Rejected => println!("(nothing sent)"),
        SendOutcome::Finished(TurnOutcome::Completed) => {
            println!();
            if let Some(answer) = session.messages().last() {
                if let Some(tier) = answer.confidence_tier {
                    println!("[{tier}]");
                }
                for source in &answer.sources {
                    println!("  source: {} ({:.2})", source.title, source.score);
                }
            }
            println!();
        }
        SendOutcome::Finished(TurnOutcome::Errored { detail }) => {
            println!();
            eprintln!("Error: {detail}");
            println!();
        }
        SendOutcome::Finished(TurnOutcome::Cancelled) => {
            println!();
            println!("(stopped)");
            println!();
        }
    }
}
