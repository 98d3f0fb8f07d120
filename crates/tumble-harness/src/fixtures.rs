use tumble_protocol::ConfidenceTier;

use crate::question::{ProbeQuestion, QuestionCategory};

fn probe(
    id: &str,
    question: &str,
    expected_tier: ConfidenceTier,
    acceptable_tiers: &[ConfidenceTier],
    category: QuestionCategory,
) -> ProbeQuestion {
    ProbeQuestion {
        id: id.to_string(),
        question: question.to_string(),
        expected_tier,
        acceptable_tiers: acceptable_tiers.to_vec(),
        category,
    }
}

/// The standard battery run against a freshly ingested knowledge base.
/// Ordered so the grounded questions come first and the edge cases last.
pub fn standard_probes() -> Vec<ProbeQuestion> {
    use ConfidenceTier::{Answer, Caveat, Decline, Escalate, OffTopic};

    vec![
        probe(
            "lint-trap",
            "How often should I clean the lint trap?",
            Answer,
            &[Answer, Caveat],
            QuestionCategory::Maintenance,
        ),
        probe(
            "preventive-schedule",
            "What is the preventive maintenance schedule?",
            Answer,
            &[Answer, Caveat],
            QuestionCategory::Maintenance,
        ),
        probe(
            "error-e01",
            "What does error code E01 mean?",
            Answer,
            &[Answer, Caveat],
            QuestionCategory::Troubleshooting,
        ),
        probe(
            "wont-start",
            "My dryer won't start, what should I check?",
            Answer,
            &[Answer, Caveat],
            QuestionCategory::Troubleshooting,
        ),
        probe(
            "slow-dry",
            "Why are clothes taking too long to dry?",
            Answer,
            &[Answer, Caveat],
            QuestionCategory::Troubleshooting,
        ),
        probe(
            "capital-france",
            "What is the capital of France?",
            OffTopic,
            &[OffTopic, Decline],
            QuestionCategory::OffTopic,
        ),
        probe(
            "write-poem",
            "Can you write me a poem?",
            OffTopic,
            &[OffTopic, Decline],
            QuestionCategory::OffTopic,
        ),
        probe(
            "sparking",
            "My dryer is sparking and I smell smoke",
            Escalate,
            &[Escalate, Answer, Caveat],
            QuestionCategory::Safety,
        ),
        probe(
            "belt-replacement",
            "How do I replace the drum belt?",
            Caveat,
            &[Answer, Caveat, Decline],
            QuestionCategory::Maintenance,
        ),
        probe(
            "model-comparison",
            "Which Dexter dryer model is best for a laundromat?",
            Decline,
            &[Decline, Caveat, OffTopic],
            QuestionCategory::OffTopic,
        ),
    ]
}
