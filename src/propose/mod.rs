// src/propose/mod.rs

mod heuristics;
mod llm;

pub use heuristics::HeuristicProposer;
pub use llm::LlmProposer;

use crate::error::ProposalError;
use crate::model::RawCandidate;
use async_trait::async_trait;

/// The candidate-proposal collaborator: given extracted text, emit
/// zero or more raw candidates per field. May be backed by regex
/// heuristics, a language model, or anything else; the core tolerates
/// zero candidates for any field and multiple for all of them.
#[async_trait]
pub trait CandidateProposer: Send + Sync {
    async fn propose(&self, text: &str) -> Result<Vec<RawCandidate>, ProposalError>;
}
