use invoice_parser::config::LlmBackend;
use invoice_parser::{
    BatchOrchestrator, CancelFlag, CandidateProposer, Config, HeuristicProposer, InputDocument,
    LlmProposer, PdfTextExtractor,
};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Stable per-document id: file stem plus a content-hash prefix, so
/// re-runs over the same files produce comparable output.
fn document_uid(path: &Path, bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let hash_prefix: String = digest.iter().take(6).map(|b| format!("{b:02x}")).collect();
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    format!("{stem}-{hash_prefix}")
}

fn load_documents(dir: &Path) -> Result<Vec<InputDocument>, Box<dyn std::error::Error>> {
    let mut docs = Vec::new();
    let mut entries: Vec<_> = std::fs::read_dir(dir)?.collect::<Result<_, _>>()?;
    entries.sort_by_key(|e| e.path());
    for entry in entries {
        let path = entry.path();
        if path.extension().is_none_or(|e| e != "pdf") {
            continue;
        }
        let bytes = std::fs::read(&path)?;
        let document_id = document_uid(&path, &bytes);
        info!(file = %path.display(), id = %document_id, "Queued document");
        docs.push(InputDocument { document_id, bytes });
    }
    Ok(docs)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // init tracing
    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_env_filter("info")
        .init();

    let mut args = std::env::args().skip(1);
    let dir = args.next().unwrap_or_else(|| "data".to_string());
    let config = match args.next() {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let documents = load_documents(Path::new(&dir))?;
    if documents.is_empty() {
        warn!(dir = %dir, "No PDF documents found");
        return Ok(());
    }
    info!(count = documents.len(), backend = ?config.llm.backend, "Starting batch");

    let proposer: Arc<dyn CandidateProposer> = match config.llm.backend {
        LlmBackend::Heuristics => Arc::new(HeuristicProposer::new(config.resolver.clone())),
        _ => Arc::new(LlmProposer::new(config.llm.clone())),
    };
    let orchestrator = BatchOrchestrator::new(
        Arc::new(PdfTextExtractor),
        proposer,
        Arc::new(config),
    );

    let results = orchestrator
        .process_batch(documents, CancelFlag::new())
        .await;

    let mut valid = 0;
    for (document_id, outcome) in &results {
        match outcome {
            Ok(record) => {
                if record.status.is_valid() {
                    valid += 1;
                }
                println!("{}", serde_json::to_string_pretty(record)?);
            }
            Err(e) => {
                println!("{{\"document_id\": {document_id:?}, \"error\": {:?}}}", e.to_string());
            }
        }
    }
    info!(
        total = results.len(),
        valid,
        failed = results.iter().filter(|(_, r)| r.is_err()).count(),
        "Batch finished"
    );

    Ok(())
}
