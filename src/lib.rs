//! Rule-based field extraction and validation for Indian GST invoices.
//!
//! The pipeline: a text-extraction collaborator turns a PDF into raw
//! text, a candidate-proposal collaborator (regex heuristics or an LLM)
//! surfaces raw field candidates, and the deterministic core then
//! normalizes, resolves, cross-validates and assembles one frozen
//! [`InvoiceRecord`] per document. The batch layer runs documents
//! independently so one bad invoice never aborts the rest.

pub mod assemble;
pub mod batch;
pub mod config;
pub mod error;
pub mod model;
pub mod normalize;
pub mod pdf_extract;
pub mod propose;
pub mod resolve;
pub mod validate;

pub use assemble::process_document;
pub use batch::{BatchOrchestrator, CancelFlag, InputDocument};
pub use config::Config;
pub use error::{ExtractionError, NormalizationError, ProcessingError, ProposalError};
pub use model::{
    FieldName, Gstin, InvoiceDate, InvoiceRecord, IssueKind, Money, RawCandidate, RoleHint,
    TaxProfile, ValidationIssue, ValidationStatus,
};
pub use pdf_extract::{PdfTextExtractor, TextExtractor};
pub use propose::{CandidateProposer, HeuristicProposer, LlmProposer};
