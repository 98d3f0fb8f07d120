use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};
use tumble_chat::{run_turn, CancelToken, TurnOutcome};
use tumble_client::ChatTransport;
use tumble_protocol::{ConfidenceTier, ProtocolEvent, Source};

use crate::question::{grade, ProbeQuestion};

/// Error text recorded on probes cut short by [`ProbeRunner::stop_all`].
pub const ABORTED_MARKER: &str = "Aborted";

/// Outcome of one probe, updated in place while its turn streams.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProbeResult {
    pub question_id: String,
    pub actual_tier: Option<ConfidenceTier>,
    pub content: String,
    pub sources: Vec<Source>,
    pub duration_ms: u64,
    pub pass: bool,
    pub is_running: bool,
    pub error: Option<String>,
}

impl ProbeResult {
    fn running(question_id: String) -> Self {
        Self {
            question_id,
            actual_tier: None,
            content: String::new(),
            sources: Vec::new(),
            duration_ms: 0,
            pass: false,
            is_running: true,
            error: None,
        }
    }
}

#[derive(Default)]
struct RunnerState {
    results: Vec<ProbeResult>,
    index: HashMap<String, usize>,
    running_all: bool,
    probe_in_flight: bool,
    active_cancel: Option<CancelToken>,
}

impl RunnerState {
    fn upsert(&mut self, result: ProbeResult) {
        match self.index.get(&result.question_id) {
            Some(slot) => self.results[*slot] = result,
            None => {
                self.index
                    .insert(result.question_id.clone(), self.results.len());
                self.results.push(result);
            }
        }
    }

    fn update(&mut self, question_id: &str, mutate: impl FnOnce(&mut ProbeResult)) {
        if let Some(slot) = self.index.get(question_id) {
            mutate(&mut self.results[*slot]);
        }
    }

    fn get(&self, question_id: &str) -> Option<&ProbeResult> {
        self.index
            .get(question_id)
            .map(|slot| &self.results[*slot])
    }
}

/// Runs scripted probes against the backend, strictly one at a time, each
/// on a fresh session so answers cannot lean on prior context.
pub struct ProbeRunner {
    transport: Arc<dyn ChatTransport>,
    state: Mutex<RunnerState>,
}

impl ProbeRunner {
    pub fn new(transport: Arc<dyn ChatTransport>) -> Self {
        Self {
            transport,
            state: Mutex::new(RunnerState::default()),
        }
    }

    /// Runs a single probe to completion. Returns `None` without side
    /// effects when another probe is already in flight.
    pub async fn run_one(&self, question: &ProbeQuestion) -> Option<ProbeResult> {
        let cancel = CancelToken::new();
        let result = self.run_probe(question, cancel, false).await?;
        let mut state = self.state.lock().expect("runner state lock");
        if !state.running_all {
            state.active_cancel = None;
        }
        Some(result)
    }

    /// Runs the battery in order, stopping early once cancellation is
    /// signaled. Returns a snapshot of the results in battery order.
    pub async fn run_all(&self, questions: &[ProbeQuestion]) -> Vec<ProbeResult> {
        let cancel = {
            let mut state = self.state.lock().expect("runner state lock");
            if state.running_all || state.probe_in_flight {
                return Vec::new();
            }
            state.running_all = true;
            state.results.clear();
            state.index.clear();
            let cancel = CancelToken::new();
            state.active_cancel = Some(cancel.clone());
            cancel
        };

        info!(probes = questions.len(), "probe battery started");
        for question in questions {
            if cancel.is_cancelled() {
                break;
            }
            self.run_probe(question, cancel.clone(), true).await;
        }

        let mut state = self.state.lock().expect("runner state lock");
        state.running_all = false;
        state.active_cancel = None;
        let results = state.results.clone();
        drop(state);

        let passed = results.iter().filter(|result| result.pass).count();
        info!(passed, total = results.len(), "probe battery finished");
        results
    }

    async fn run_probe(
        &self,
        question: &ProbeQuestion,
        cancel: CancelToken,
        in_battery: bool,
    ) -> Option<ProbeResult> {
        {
            let mut state = self.state.lock().expect("runner state lock");
            // A battery owns the runner until it finishes; a standalone probe
            // must not slip in between two of its questions.
            if state.probe_in_flight || (!in_battery && state.running_all) {
                return None;
            }
            state.probe_in_flight = true;
            state.active_cancel = Some(cancel.clone());
            state.upsert(ProbeResult::running(question.id.clone()));
        }

        debug!(probe = %question.id, "probe started");
        let started = Instant::now();
        let (turn, outcome) = run_turn(
            self.transport.as_ref(),
            &question.question,
            None,
            &cancel,
            |turn, event| {
                let mut state = self.state.lock().expect("runner state lock");
                match event {
                    ProtocolEvent::Metadata(metadata) => {
                        let tier = metadata.confidence_tier;
                        state.update(&question.id, |result| result.actual_tier = Some(tier));
                    }
                    ProtocolEvent::Delta { .. } => {
                        let content = turn.content.clone();
                        state.update(&question.id, |result| result.content = content);
                    }
                    ProtocolEvent::Sources(sources) => {
                        let sources = sources.clone();
                        state.update(&question.id, |result| result.sources = sources);
                    }
                    ProtocolEvent::Done { .. } | ProtocolEvent::Error { .. } => {}
                }
            },
        )
        .await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let mut state = self.state.lock().expect("runner state lock");
        let (pass, error) = match &outcome {
            TurnOutcome::Completed => (
                grade(&question.acceptable_tiers, turn.confidence_tier),
                None,
            ),
            TurnOutcome::Errored { detail } => {
                warn!(probe = %question.id, detail = %detail, "probe errored");
                (false, Some(detail.clone()))
            }
            TurnOutcome::Cancelled => (false, Some(ABORTED_MARKER.to_string())),
        };
        state.update(&question.id, |result| {
            result.actual_tier = turn.confidence_tier;
            result.content = turn.content.clone();
            result.sources = turn.sources.clone();
            result.duration_ms = duration_ms;
            result.pass = pass;
            result.is_running = false;
            result.error = error;
        });
        state.probe_in_flight = false;
        let finalized = state.get(&question.id).cloned();
        drop(state);

        debug!(probe = %question.id, pass, duration_ms, "probe finished");
        finalized
    }

    /// Cancels whatever is in flight and marks every still-running result
    /// as aborted.
    pub fn stop_all(&self) {
        let mut state = self.state.lock().expect("runner state lock");
        if let Some(cancel) = &state.active_cancel {
            cancel.cancel();
        }
        state.running_all = false;
        for result in &mut state.results {
            if result.is_running {
                result.is_running = false;
                result.pass = false;
                result.error = Some(ABORTED_MARKER.to_string());
            }
        }
    }

    /// Discards all recorded results. Does not cancel an in-flight probe.
    pub fn clear_results(&self) {
        let mut state = self.state.lock().expect("runner state lock");
        state.results.clear();
        state.index.clear();
    }

    /// Results in battery order, including any still-running entry.
    pub fn results(&self) -> Vec<ProbeResult> {
        self.state
            .lock()
            .expect("runner state lock")
            .results
            .clone()
    }

    pub fn result(&self, question_id: &str) -> Option<ProbeResult> {
        self.state
            .lock()
            .expect("runner state lock")
            .get(question_id)
            .cloned()
    }

    pub fn is_running_all(&self) -> bool {
        self.state.lock().expect("runner state lock").running_all
    }
}
