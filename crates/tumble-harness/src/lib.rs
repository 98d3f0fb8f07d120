//! Scripted probe battery for exercising a running chat backend.
//!
//! Each probe sends one fixed question on a fresh session and grades the
//! backend's confidence tier against an allow-list. Probes run strictly
//! one at a time.
mod fixtures;
mod question;
mod runner;

pub use fixtures::standard_probes;
pub use question::{grade, ProbeQuestion, QuestionCategory};
pub use runner::{ProbeResult, ProbeRunner, ABORTED_MARKER};
