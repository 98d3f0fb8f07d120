use serde::{Deserialize, Serialize};
use tumble_protocol::ConfidenceTier;

/// Broad topic of a probe question, used for grouping in reports.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionCategory {
    Maintenance,
    Troubleshooting,
    OffTopic,
    Safety,
}

/// One scripted question with its grading allow-list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProbeQuestion {
    pub id: String,
    pub question: String,
    /// The tier the backend is expected to pick.
    pub expected_tier: ConfidenceTier,
    /// Tiers that also count as a pass.
    pub acceptable_tiers: Vec<ConfidenceTier>,
    pub category: QuestionCategory,
}

/// A probe passes when the backend reported a tier and that tier is in the
/// allow-list. No tier (errored or aborted turn) always fails.
pub fn grade(acceptable_tiers: &[ConfidenceTier], actual_tier: Option<ConfidenceTier>) -> bool {
    match actual_tier {
        Some(tier) => acceptable_tiers.contains(&tier),
        None => false,
    }
}
