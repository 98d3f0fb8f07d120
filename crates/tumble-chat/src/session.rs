use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tumble_client::ChatTransport;
use tumble_protocol::{ConfidenceTier, ProtocolEvent, Source};

use crate::cancel::CancelToken;
use crate::new_message_id;
use crate::turn::{run_turn, TurnOutcome, TurnState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    User,
    Assistant,
}

/// One message in the conversation history.
///
/// User messages are created complete and never touched again. Assistant
/// messages start empty with `is_streaming = true` and are mutated in place
/// as events arrive, then finalized on the turn's terminal transition.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    pub confidence_tier: Option<ConfidenceTier>,
    pub sources: Vec<Source>,
    pub is_streaming: bool,
}

impl ChatMessage {
    pub fn user(id: String, content: String) -> Self {
        Self {
            id,
            role: MessageRole::User,
            content,
            confidence_tier: None,
            sources: Vec::new(),
            is_streaming: false,
        }
    }

    pub fn streaming_assistant(id: String) -> Self {
        Self {
            id,
            role: MessageRole::Assistant,
            content: String::new(),
            confidence_tier: None,
            sources: Vec::new(),
            is_streaming: true,
        }
    }
}

/// Ordered message store indexed by stable id, with update-in-place
/// semantics behind a narrow mutation API.
#[derive(Debug, Default)]
pub struct MessageArena {
    messages: Vec<ChatMessage>,
    index: HashMap<String, usize>,
}

impl MessageArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.index.insert(message.id.clone(), self.messages.len());
        self.messages.push(message);
    }

    pub fn get(&self, id: &str) -> Option<&ChatMessage> {
        self.index.get(id).map(|slot| &self.messages[*slot])
    }

    /// Applies `mutate` to the message with the given id; false if absent.
    pub fn update(&mut self, id: &str, mutate: impl FnOnce(&mut ChatMessage)) -> bool {
        match self.index.get(id) {
            Some(slot) => {
                mutate(&mut self.messages[*slot]);
                true
            }
            None => false,
        }
    }

    /// Moves a message to a new stable id, keeping its position. Used when
    /// the backend reassigns the assistant message id via metadata.
    pub fn rekey(&mut self, old_id: &str, new_id: &str) -> bool {
        if old_id == new_id {
            return self.index.contains_key(old_id);
        }
        let Some(slot) = self.index.remove(old_id) else {
            return false;
        };
        self.messages[slot].id = new_id.to_string();
        self.index.insert(new_id.to_string(), slot);
        true
    }

    /// Clears the streaming flag everywhere. Covers the race between a
    /// cancellation and a last in-flight update.
    pub fn finish_streaming(&mut self) {
        for message in &mut self.messages {
            message.is_streaming = false;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.index.clear();
    }
}

/// Disposition of one [`ChatSession::send`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Blank input or a turn already in flight; nothing was queued.
    Rejected,
    Finished(TurnOutcome),
}

#[derive(Default)]
struct SessionState {
    messages: MessageArena,
    session_id: Option<String>,
    turn_in_flight: bool,
    active_cancel: Option<CancelToken>,
}

/// A single running conversation: message history, active turn lifecycle,
/// and session identity continuity across turns.
///
/// At most one turn is in flight per session; `send` while streaming is a
/// no-op rather than a queue.
pub struct ChatSession {
    transport: Arc<dyn ChatTransport>,
    state: Mutex<SessionState>,
}

impl ChatSession {
    pub fn new(transport: Arc<dyn ChatTransport>) -> Self {
        Self {
            transport,
            state: Mutex::new(SessionState::default()),
        }
    }

    /// Sends one user message and streams the assistant answer to completion.
    pub async fn send(&self, text: &str) -> SendOutcome {
        self.send_with(text, |_, _| {}).await
    }

    /// Like [`send`](Self::send), invoking `on_event` after each event has
    /// been applied to the history (for incremental rendering).
    pub async fn send_with(
        &self,
        text: &str,
        mut on_event: impl FnMut(&TurnState, &ProtocolEvent) + Send,
    ) -> SendOutcome {
        if text.trim().is_empty() {
            return SendOutcome::Rejected;
        }

        let (cancel, session_id, assistant_id) = {
            let mut state = self.state.lock().expect("session state lock");
            if state.turn_in_flight {
                return SendOutcome::Rejected;
            }
            state.turn_in_flight = true;
            let cancel = CancelToken::new();
            state.active_cancel = Some(cancel.clone());
            state
                .messages
                .push(ChatMessage::user(new_message_id(), text.to_string()));
            let assistant_id = new_message_id();
            state
                .messages
                .push(ChatMessage::streaming_assistant(assistant_id.clone()));
            (cancel, state.session_id.clone(), assistant_id)
        };

        let mut current_id = assistant_id;
        let (_, outcome) = run_turn(
            self.transport.as_ref(),
            text,
            session_id.as_deref(),
            &cancel,
            |turn, event| {
                {
                    let mut state = self.state.lock().expect("session state lock");
                    match event {
                        ProtocolEvent::Metadata(metadata) => {
                            if !metadata.session_id.is_empty() {
                                state.session_id = Some(metadata.session_id.clone());
                            }
                            if !metadata.message_id.is_empty()
                                && metadata.message_id != current_id
                            {
                                state.messages.rekey(&current_id, &metadata.message_id);
                                current_id = metadata.message_id.clone();
                            }
                            let tier = metadata.confidence_tier;
                            state.messages.update(&current_id, |message| {
                                message.confidence_tier = Some(tier);
                            });
                        }
                        ProtocolEvent::Delta { .. } => {
                            let content = turn.content.clone();
                            state
                                .messages
                                .update(&current_id, |message| message.content = content);
                        }
                        ProtocolEvent::Sources(sources) => {
                            let sources = sources.clone();
                            state
                                .messages
                                .update(&current_id, |message| message.sources = sources);
                        }
                        ProtocolEvent::Done { .. } | ProtocolEvent::Error { .. } => {}
                    }
                }
                on_event(turn, event);
            },
        )
        .await;

        let mut state = self.state.lock().expect("session state lock");
        match &outcome {
            TurnOutcome::Completed | TurnOutcome::Cancelled => {
                state
                    .messages
                    .update(&current_id, |message| message.is_streaming = false);
            }
            TurnOutcome::Errored { detail } => {
                let content = format!("Error: {detail}");
                state.messages.update(&current_id, |message| {
                    message.content = content;
                    message.is_streaming = false;
                });
            }
        }
        state.turn_in_flight = false;
        state.active_cancel = None;
        drop(state);

        SendOutcome::Finished(outcome)
    }

    /// Signals cancellation to the in-flight turn, if any, and defensively
    /// clears the streaming flag on every message.
    pub fn stop(&self) {
        let mut state = self.state.lock().expect("session state lock");
        if let Some(cancel) = &state.active_cancel {
            cancel.cancel();
        }
        state.messages.finish_streaming();
    }

    /// Discards history and the cached session token. Does not cancel an
    /// in-flight turn; callers wanting that call [`stop`](Self::stop) first.
    pub fn clear(&self) {
        let mut state = self.state.lock().expect("session state lock");
        state.messages.clear();
        state.session_id = None;
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        let state = self.state.lock().expect("session state lock");
        state.messages.iter().cloned().collect()
    }

    pub fn session_id(&self) -> Option<String> {
        self.state
            .lock()
            .expect("session state lock")
            .session_id
            .clone()
    }

    pub fn is_turn_in_flight(&self) -> bool {
        self.state.lock().expect("session state lock").turn_in_flight
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use tumble_client::{ChatStreamRequest, ChatTransport, ClientError, StreamHandle};
    use tumble_protocol::ConfidenceTier;

    use super::{ChatMessage, ChatSession, MessageArena, MessageRole, SendOutcome};
    use crate::turn::{TurnOutcome, CONNECT_FAILURE_DETAIL};

    struct ReplayTransport {
        turns: Mutex<VecDeque<Vec<Vec<u8>>>>,
        requests: Mutex<Vec<ChatStreamRequest>>,
    }

    impl ReplayTransport {
        fn new(turns: Vec<Vec<&str>>) -> Self {
            Self {
                turns: Mutex::new(
                    turns
                        .into_iter()
                        .map(|chunks| {
                            chunks
                                .into_iter()
                                .map(|chunk| chunk.as_bytes().to_vec())
                                .collect()
                        })
                        .collect(),
                ),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    struct ReplayHandle {
        chunks: VecDeque<Vec<u8>>,
    }

    #[async_trait]
    impl StreamHandle for ReplayHandle {
        async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, ClientError> {
            Ok(self.chunks.pop_front())
        }
    }

    #[async_trait]
    impl ChatTransport for ReplayTransport {
        async fn open_turn(
            &self,
            request: &ChatStreamRequest,
        ) -> Result<Box<dyn StreamHandle>, ClientError> {
            self.requests
                .lock()
                .expect("request log lock")
                .push(request.clone());
            let chunks = self
                .turns
                .lock()
                .expect("turn script lock")
                .pop_front()
                .unwrap_or_default();
            Ok(Box::new(ReplayHandle {
                chunks: chunks.into(),
            }))
        }
    }

    /// Transport whose stream never ends: one delta roughly every 10ms.
    struct DrippingTransport;

    struct DrippingHandle;

    #[async_trait]
    impl StreamHandle for DrippingHandle {
        async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, ClientError> {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(Some(
                b"event: delta\ndata: {\"content\":\"drip \"}\n\n".to_vec(),
            ))
        }
    }

    #[async_trait]
    impl ChatTransport for DrippingTransport {
        async fn open_turn(
            &self,
            _request: &ChatStreamRequest,
        ) -> Result<Box<dyn StreamHandle>, ClientError> {
            Ok(Box::new(DrippingHandle))
        }
    }

    const METADATA: &str = "event: metadata\ndata: {\"session_id\":\"s-1\",\"message_id\":\"srv-1\",\"confidence_tier\":\"ANSWER\"}\n\n";
    const DONE: &str = "event: done\ndata: {\"usage\":{}}\n\n";

    #[test]
    fn arena_rekey_preserves_position_and_content() {
        let mut arena = MessageArena::new();
        arena.push(ChatMessage::user("u-1".to_string(), "hi".to_string()));
        arena.push(ChatMessage::streaming_assistant("a-1".to_string()));
        assert!(arena.update("a-1", |message| message.content = "body".to_string()));

        assert!(arena.rekey("a-1", "srv-9"));
        assert!(arena.get("a-1").is_none());
        let moved = arena.get("srv-9").expect("rekeyed message present");
        assert_eq!(moved.content, "body");
        assert_eq!(arena.iter().nth(1).expect("second message").id, "srv-9");

        assert!(!arena.rekey("a-1", "other"));
        assert!(!arena.update("missing", |_| {}));
    }

    #[tokio::test]
    async fn blank_input_is_rejected_without_touching_history() {
        let session = ChatSession::new(Arc::new(ReplayTransport::new(vec![])));
        assert_eq!(session.send("   ").await, SendOutcome::Rejected);
        assert!(session.messages().is_empty());
    }

    #[tokio::test]
    async fn completed_turn_finalizes_the_assistant_message() {
        let transport = Arc::new(ReplayTransport::new(vec![vec![
            METADATA,
            "event: delta\ndata: {\"content\":\"Every \"}\n\n",
            "event: delta\ndata: {\"content\":\"load.\"}\n\n",
            "event: sources\ndata: [{\"title\":\"Maintenance\",\"text\":\"...\",\"score\":0.9}]\n\n",
            DONE,
        ]]));
        let session = ChatSession::new(transport.clone());

        let outcome = session.send("How often should I clean the lint trap?").await;
        assert_eq!(outcome, SendOutcome::Finished(TurnOutcome::Completed));

        let messages = session.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[0].content, "How often should I clean the lint trap?");
        assert!(!messages[0].is_streaming);

        let answer = &messages[1];
        assert_eq!(answer.role, MessageRole::Assistant);
        // Backend reassigned the id via metadata.
        assert_eq!(answer.id, "srv-1");
        assert_eq!(answer.content, "Every load.");
        assert_eq!(answer.confidence_tier, Some(ConfidenceTier::Answer));
        assert_eq!(answer.sources.len(), 1);
        assert!(!answer.is_streaming);

        assert_eq!(session.session_id().as_deref(), Some("s-1"));
        assert!(!session.is_turn_in_flight());
    }

    #[tokio::test]
    async fn session_token_is_reused_on_the_next_turn() {
        let transport = Arc::new(ReplayTransport::new(vec![
            vec![METADATA, DONE],
            vec![DONE],
        ]));
        let session = ChatSession::new(transport.clone());

        session.send("first").await;
        session.send("second").await;

        let requests = transport.requests.lock().expect("request log lock");
        assert_eq!(requests[0].session_id, None);
        assert_eq!(requests[1].session_id.as_deref(), Some("s-1"));
    }

    #[tokio::test]
    async fn connect_failure_becomes_error_text_on_the_assistant_message() {
        struct FailingTransport;
        #[async_trait]
        impl ChatTransport for FailingTransport {
            async fn open_turn(
                &self,
                _request: &ChatStreamRequest,
            ) -> Result<Box<dyn StreamHandle>, ClientError> {
                Err(ClientError::HttpStatus {
                    status: 500,
                    body: "boom".to_string(),
                })
            }
        }

        let session = ChatSession::new(Arc::new(FailingTransport));
        let outcome = session.send("hello").await;
        assert_eq!(
            outcome,
            SendOutcome::Finished(TurnOutcome::Errored {
                detail: CONNECT_FAILURE_DETAIL.to_string()
            })
        );

        let messages = session.messages();
        assert_eq!(
            messages[1].content,
            format!("Error: {CONNECT_FAILURE_DETAIL}")
        );
        assert!(!messages[1].is_streaming);
    }

    #[tokio::test]
    async fn stop_cancels_the_in_flight_turn_and_keeps_partial_content() {
        let session = Arc::new(ChatSession::new(Arc::new(DrippingTransport)));
        let sender = session.clone();
        let turn = tokio::spawn(async move { sender.send("hello").await });

        tokio::time::sleep(Duration::from_millis(35)).await;
        session.stop();

        let outcome = turn.await.expect("send task should finish");
        assert_eq!(outcome, SendOutcome::Finished(TurnOutcome::Cancelled));

        let messages = session.messages();
        let answer = &messages[1];
        assert!(answer.content.starts_with("drip "));
        assert!(!answer.content.contains("Error"));
        assert!(!answer.is_streaming);
        assert!(!session.is_turn_in_flight());
    }

    #[tokio::test]
    async fn send_while_a_turn_is_in_flight_is_a_no_op() {
        let session = Arc::new(ChatSession::new(Arc::new(DrippingTransport)));
        let sender = session.clone();
        let turn = tokio::spawn(async move { sender.send("first").await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(session.send("second").await, SendOutcome::Rejected);
        // Only the first turn's pair of messages exists.
        assert_eq!(session.messages().len(), 2);

        session.stop();
        turn.await.expect("send task should finish");
    }

    #[tokio::test]
    async fn clear_discards_history_and_session_identity() {
        let transport = Arc::new(ReplayTransport::new(vec![vec![METADATA, DONE]]));
        let session = ChatSession::new(transport);
        session.send("hello").await;
        assert_eq!(session.messages().len(), 2);

        session.clear();
        assert!(session.messages().is_empty());
        assert_eq!(session.session_id(), None);
    }
}
