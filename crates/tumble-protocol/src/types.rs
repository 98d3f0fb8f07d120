use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Backend-assigned classification of how well an answer is supported by
/// retrieved material. Produced at most once per turn, in the metadata event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceTier {
    Answer,
    Caveat,
    Ambiguous,
    Decline,
    Escalate,
    OffTopic,
}

impl ConfidenceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Answer => "ANSWER",
            Self::Caveat => "CAVEAT",
            Self::Ambiguous => "AMBIGUOUS",
            Self::Decline => "DECLINE",
            Self::Escalate => "ESCALATE",
            Self::OffTopic => "OFF_TOPIC",
        }
    }
}

impl fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A retrieved document excerpt cited in support of an answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Source {
    pub title: String,
    pub text: String,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Per-turn identifiers and classification carried by the metadata event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TurnMetadata {
    pub session_id: String,
    pub message_id: String,
    pub confidence_tier: ConfidenceTier,
}

/// Open set of numeric usage counters reported by the done event.
pub type TurnUsage = BTreeMap<String, f64>;

/// One decoded event from the chat stream.
///
/// A well-formed turn carries at most one `Metadata` (before any `Delta` or
/// `Sources`) and exactly one terminal `Done` or `Error`, after which the
/// stream is over.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolEvent {
    Metadata(TurnMetadata),
    Delta { content: String },
    Sources(Vec<Source>),
    Done { usage: Option<TurnUsage> },
    Error { detail: String },
}

impl ProtocolEvent {
    /// True for the unique success or failure event ending a turn.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }
}
