// src/assemble.rs

use crate::config::Config;
use crate::model::{
    FieldName, InvoiceRecord, RawCandidate, Severity, TaxProfile, ValidationIssue,
    ValidationStatus,
};
use crate::normalize::CandidatePool;
use crate::resolve::{ResolvedFields, Resolver};
use crate::validate::validate;
use tracing::info;

/// The deterministic core: raw text plus raw candidates in, one frozen
/// record out. Pure apart from logging; no shared state, so the batch
/// layer can run documents in parallel freely.
pub fn process_document(
    document_id: &str,
    text: &str,
    candidates: &[RawCandidate],
    cfg: &Config,
) -> InvoiceRecord {
    let pool = CandidatePool::build(candidates, &cfg.normalizer);
    let resolved = Resolver::new(text, &cfg.resolver).resolve(&pool);
    let validator_issues = validate(&resolved, &cfg.validation);
    let record = assemble(
        document_id,
        text.len(),
        pool.notes,
        resolved,
        validator_issues,
    );
    info!(
        document_id = %record.document_id,
        status = ?record.status,
        "Assembled invoice record"
    );
    record
}

/// Compose resolver and validator output into the final record and
/// freeze it. No field defaulting happens here; what the resolver left
/// unset stays unset.
pub fn assemble(
    document_id: &str,
    source_text_len: usize,
    notes: Vec<ValidationIssue>,
    resolved: ResolvedFields,
    validator_issues: Vec<ValidationIssue>,
) -> InvoiceRecord {
    // Discovery order: resolver ambiguities first, then validator rules.
    let mut issues: Vec<ValidationIssue> = resolved.issues.clone();
    issues.extend(validator_issues);

    let status = if issues.iter().any(|i| i.kind.severity() == Severity::Hard) {
        ValidationStatus::Invalid(issues)
    } else if !issues.is_empty() {
        ValidationStatus::Ambiguous(issues)
    } else {
        ValidationStatus::Valid
    };

    InvoiceRecord {
        document_id: document_id.to_string(),
        source_text_len,
        seller_name: resolved.text(FieldName::SellerName).map(String::from),
        seller_gst: resolved.gstin(FieldName::SellerGst).cloned(),
        buyer_name: resolved.text(FieldName::BuyerName).map(String::from),
        buyer_gst: resolved.gstin(FieldName::BuyerGst).cloned(),
        invoice_number: resolved.text(FieldName::InvoiceNumber).map(String::from),
        invoice_date: resolved.date(FieldName::InvoiceDate).copied(),
        hsn_code: resolved.text(FieldName::HsnCode).map(String::from),
        sub_amount: resolved.money(FieldName::SubAmount).cloned(),
        tax: tax_profile(&resolved),
        total_amount: resolved.money(FieldName::TotalAmount).cloned(),
        notes,
        status,
    }
}

/// Build the tax profile only when exactly one regime is active. A
/// conflicted regime is never silently collapsed into one side; the
/// record carries `None` here and the R1 issue explains why.
fn tax_profile(resolved: &ResolvedFields) -> Option<TaxProfile> {
    let igst = resolved.nonzero_money(FieldName::Igst);
    let cgst = resolved.nonzero_money(FieldName::Cgst);
    let sgst = resolved.nonzero_money(FieldName::Sgst);
    match (igst, cgst, sgst) {
        (Some(amount), None, None) => Some(TaxProfile::Igst {
            amount: amount.clone(),
        }),
        (None, Some(cgst), Some(sgst)) => Some(TaxProfile::CgstSgst {
            cgst: cgst.clone(),
            sgst: sgst.clone(),
        }),
        _ => None,
    }
}
