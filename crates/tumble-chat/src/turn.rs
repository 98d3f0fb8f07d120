use tumble_client::{ChatStreamRequest, ChatTransport, StreamHandle};
use tumble_protocol::{ConfidenceTier, ProtocolEvent, Source, StreamDecoder, TurnUsage};

use crate::cancel::CancelToken;

/// Fixed detail reported when the streaming request cannot be established.
pub const CONNECT_FAILURE_DETAIL: &str = "Failed to connect to chat service";

const STREAM_ENDED_DETAIL: &str = "stream ended unexpectedly";

/// Accumulated state of one streaming turn, updated event by event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnState {
    pub session_id: Option<String>,
    pub message_id: Option<String>,
    pub confidence_tier: Option<ConfidenceTier>,
    pub content: String,
    pub sources: Vec<Source>,
    pub usage: Option<TurnUsage>,
}

impl TurnState {
    fn apply(&mut self, event: &ProtocolEvent) {
        match event {
            ProtocolEvent::Metadata(metadata) => {
                if !metadata.session_id.is_empty() {
                    self.session_id = Some(metadata.session_id.clone());
                }
                if !metadata.message_id.is_empty() {
                    self.message_id = Some(metadata.message_id.clone());
                }
                self.confidence_tier = Some(metadata.confidence_tier);
            }
            ProtocolEvent::Delta { content } => self.content.push_str(content),
            // Most recent wins; the backend sends this at most once.
            ProtocolEvent::Sources(sources) => self.sources = sources.clone(),
            ProtocolEvent::Done { usage } => self.usage = usage.clone(),
            ProtocolEvent::Error { .. } => {}
        }
    }
}

/// The unique terminal transition of one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed,
    Errored { detail: String },
    Cancelled,
}

/// Drives one request/response exchange end to end.
///
/// Opens the stream over `transport`, pumps chunks through a turn-local
/// decoder, applies each event to the turn state, and invokes `on_event`
/// after every application. The cancellation token is checked before each
/// body read and before each event; exactly one terminal outcome is returned
/// per turn. An open failure yields [`CONNECT_FAILURE_DETAIL`] without the
/// decoder ever seeing a byte.
pub async fn run_turn(
    transport: &dyn ChatTransport,
    message: &str,
    session_id: Option<&str>,
    cancel: &CancelToken,
    mut on_event: impl FnMut(&TurnState, &ProtocolEvent) + Send,
) -> (TurnState, TurnOutcome) {
    let mut state = TurnState {
        session_id: session_id.map(str::to_string),
        ..TurnState::default()
    };
    let request = ChatStreamRequest {
        message: message.to_string(),
        session_id: state.session_id.clone(),
    };

    let mut handle = match transport.open_turn(&request).await {
        Ok(handle) => handle,
        Err(error) => {
            tracing::warn!(%error, "chat stream could not be opened");
            return (
                state,
                TurnOutcome::Errored {
                    detail: CONNECT_FAILURE_DETAIL.to_string(),
                },
            );
        }
    };

    let mut decoder = StreamDecoder::new();
    let outcome = pump(handle.as_mut(), &mut decoder, &mut state, cancel, &mut on_event).await;
    if decoder.skipped_payloads() > 0 {
        tracing::warn!(
            count = decoder.skipped_payloads(),
            "dropped malformed stream payloads during turn"
        );
    }
    tracing::debug!(outcome = ?outcome, "turn finished");
    (state, outcome)
}

async fn pump(
    handle: &mut dyn StreamHandle,
    decoder: &mut StreamDecoder,
    state: &mut TurnState,
    cancel: &CancelToken,
    on_event: &mut (dyn FnMut(&TurnState, &ProtocolEvent) + Send),
) -> TurnOutcome {
    loop {
        if cancel.is_cancelled() {
            return TurnOutcome::Cancelled;
        }
        let chunk = match handle.next_chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => {
                return TurnOutcome::Errored {
                    detail: STREAM_ENDED_DETAIL.to_string(),
                }
            }
            Err(error) => {
                return TurnOutcome::Errored {
                    detail: format!("stream read failed: {error}"),
                }
            }
        };
        for event in decoder.push(&chunk) {
            if cancel.is_cancelled() {
                return TurnOutcome::Cancelled;
            }
            state.apply(&event);
            on_event(state, &event);
            match event {
                ProtocolEvent::Done { .. } => return TurnOutcome::Completed,
                ProtocolEvent::Error { detail } => return TurnOutcome::Errored { detail },
                _ => {}
            }
        }
    }
}
