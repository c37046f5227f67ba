// src/error.rs

use thiserror::Error;

/// Why a single candidate was rejected during normalization.
///
/// These are per-candidate and recoverable: the candidate is dropped
/// from its field's pool and processing continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizationError {
    #[error("amount is negative: {0}")]
    NegativeAmount(String),
    #[error("unparseable amount: {0}")]
    UnparseableAmount(String),
    #[error("malformed GSTIN: {0}")]
    MalformedGstin(String),
    #[error("unrecognized date format: {0}")]
    UnrecognizedDate(String),
    #[error("looks like a reference/PRN number, not an invoice number: {0}")]
    LooksLikeReferenceNumber(String),
    #[error("empty after whitespace cleanup")]
    EmptyText,
}

/// Failure of the text-extraction collaborator for one document.
#[derive(Debug, Clone, Error)]
pub enum ExtractionError {
    #[error("failed to parse PDF: {0}")]
    Parse(String),
    #[error("document is scanned/image-only, no text layer")]
    ScannedImage,
}

/// Failure of the candidate-proposal collaborator for one document.
#[derive(Debug, Clone, Error)]
pub enum ProposalError {
    #[error("proposal backend error: {0}")]
    Backend(String),
    #[error("proposal response was not parseable: {0}")]
    MalformedResponse(String),
}

/// Per-document failure recorded by the batch orchestrator. One bad
/// document never aborts the batch.
#[derive(Debug, Clone, Error)]
pub enum ProcessingError {
    #[error("no extractable text in document")]
    NoExtractableText,
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error(transparent)]
    Proposal(#[from] ProposalError),
    #[error("extraction timed out after {0} s")]
    ExtractionTimeout(u64),
    #[error("batch was cancelled before this document started")]
    Cancelled,
    #[error("document task aborted: {0}")]
    TaskAborted(String),
}
