// src/batch.rs

use crate::assemble::process_document;
use crate::config::Config;
use crate::error::ProcessingError;
use crate::model::InvoiceRecord;
use crate::pdf_extract::TextExtractor;
use crate::propose::CandidateProposer;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{Instrument, info, info_span, warn};

/// One document handed to the batch, with the identifier the caller
/// wants echoed back in the results.
#[derive(Debug, Clone)]
pub struct InputDocument {
    pub document_id: String,
    pub bytes: Vec<u8>,
}

pub type DocumentOutcome = Result<InvoiceRecord, ProcessingError>;

/// Cooperative cancellation for a running batch. Cancelling stops new
/// extraction calls from being issued; documents already past that
/// point finish normally, so completed records are never corrupted.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runs the per-document pipeline across a batch. Documents are fully
/// independent, so they run concurrently up to `batch.max_in_flight`;
/// the cap protects the (possibly rate-limited) external collaborators.
pub struct BatchOrchestrator {
    extractor: Arc<dyn TextExtractor>,
    proposer: Arc<dyn CandidateProposer>,
    config: Arc<Config>,
}

impl BatchOrchestrator {
    pub fn new(
        extractor: Arc<dyn TextExtractor>,
        proposer: Arc<dyn CandidateProposer>,
        config: Arc<Config>,
    ) -> Self {
        BatchOrchestrator {
            extractor,
            proposer,
            config,
        }
    }

    /// Process every document, isolating per-document failures. The
    /// output has exactly one entry per input, in input order.
    pub async fn process_batch(
        &self,
        documents: Vec<InputDocument>,
        cancel: CancelFlag,
    ) -> Vec<(String, DocumentOutcome)> {
        let semaphore = Arc::new(Semaphore::new(self.config.batch.max_in_flight.max(1)));
        let mut handles = Vec::with_capacity(documents.len());

        for doc in documents {
            let semaphore = Arc::clone(&semaphore);
            let extractor = Arc::clone(&self.extractor);
            let proposer = Arc::clone(&self.proposer);
            let config = Arc::clone(&self.config);
            let cancel = cancel.clone();
            let document_id = doc.document_id.clone();
            let span = info_span!("document", id = %document_id);
            let task_id = document_id.clone();

            let handle = tokio::spawn(
                async move {
                    // Semaphore is never closed while we hold it.
                    let _permit = semaphore.acquire().await.expect("semaphore closed");
                    if cancel.is_cancelled() {
                        warn!("Batch cancelled before this document started");
                        return (task_id, Err(ProcessingError::Cancelled));
                    }
                    let outcome =
                        run_document(&doc, extractor.as_ref(), proposer.as_ref(), &config).await;
                    if let Err(ref e) = outcome {
                        warn!(error = %e, "Document failed");
                    }
                    (task_id, outcome)
                }
                .instrument(span),
            );
            handles.push((document_id, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (document_id, handle) in handles {
            // A panicking collaborator must not take the batch down
            // with it; the join error becomes that document's result.
            match handle.await {
                Ok(entry) => results.push(entry),
                Err(e) => {
                    warn!(id = %document_id, error = %e, "Document task aborted");
                    results.push((document_id, Err(ProcessingError::TaskAborted(e.to_string()))));
                }
            }
        }
        info!(
            total = results.len(),
            failed = results.iter().filter(|(_, r)| r.is_err()).count(),
            "Batch complete"
        );
        results
    }
}

/// Extraction and proposal share the per-document deadline; the
/// deterministic core afterwards is pure and effectively instant.
async fn run_document(
    doc: &InputDocument,
    extractor: &dyn TextExtractor,
    proposer: &dyn CandidateProposer,
    config: &Config,
) -> DocumentOutcome {
    let deadline = Duration::from_secs(config.batch.timeout_secs);
    let external = async {
        let text = extractor.extract_text(&doc.bytes).await?;
        if text.trim().is_empty() {
            return Err(ProcessingError::NoExtractableText);
        }
        let candidates = proposer.propose(&text).await?;
        Ok((text, candidates))
    };
    let (text, candidates) = tokio::time::timeout(deadline, external)
        .await
        .map_err(|_| ProcessingError::ExtractionTimeout(config.batch.timeout_secs))??;

    info!(
        chars = text.len(),
        candidates = candidates.len(),
        "Extraction and proposal complete"
    );
    Ok(process_document(&doc.document_id, &text, &candidates, config))
}
