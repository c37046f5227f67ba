// src/propose/heuristics.rs

use super::CandidateProposer;
use crate::config::ResolverSection;
use crate::error::ProposalError;
use crate::model::{FieldName, RawCandidate, RoleHint};
use async_trait::async_trait;
use regex::Regex;

/// Keyword-anchored regex proposer. Deliberately over-proposes: it
/// emits every plausible token with its byte offset and lets the
/// resolver pick. No model call involved.
pub struct HeuristicProposer {
    cfg: ResolverSection,
}

/// Standard GSTIN shape: state code, PAN, entity code, "Z", checksum.
const GSTIN_PATTERN: &str = r"\b\d{2}[A-Z]{5}\d{4}[A-Z][0-9A-Z]Z[0-9A-Z]\b";

/// How far back to look for a party label when hinting a GSTIN's role.
const ROLE_WINDOW: usize = 80;

impl HeuristicProposer {
    pub fn new(cfg: ResolverSection) -> Self {
        HeuristicProposer { cfg }
    }

    fn extract(&self, text: &str) -> Vec<RawCandidate> {
        let mut out = Vec::new();
        self.propose_gstins(text, &mut out);
        self.propose_names(text, &mut out);
        propose_invoice_numbers(text, &mut out);
        propose_dates(text, &mut out);
        propose_hsn_codes(text, &mut out);
        self.propose_amounts(text, &mut out);
        out
    }

    /// GSTIN-shaped tokens become GST candidates; a party label shortly
    /// before a token decides both its role hint and which field it is
    /// proposed for. An unhinted token could belong to either party, so
    /// it competes for both fields.
    fn propose_gstins(&self, text: &str, out: &mut Vec<RawCandidate>) {
        let re = Regex::new(GSTIN_PATTERN).unwrap();
        for m in re.find_iter(text) {
            let role_hint = self.role_near(text, m.start());
            let fields: &[FieldName] = match role_hint {
                Some(RoleHint::Seller) => &[FieldName::SellerGst],
                Some(RoleHint::Buyer) => &[FieldName::BuyerGst],
                _ => &[FieldName::SellerGst, FieldName::BuyerGst],
            };
            for field in fields {
                out.push(RawCandidate {
                    field: *field,
                    text: m.as_str().to_string(),
                    source_offset: m.start(),
                    role_hint,
                });
            }
        }
    }

    fn role_near(&self, text: &str, offset: usize) -> Option<RoleHint> {
        let mut end = offset.min(text.len());
        while end > 0 && !text.is_char_boundary(end) {
            end -= 1;
        }
        let mut start = end.saturating_sub(ROLE_WINDOW);
        while start > 0 && !text.is_char_boundary(start) {
            start -= 1;
        }
        let window = text[start..end].to_lowercase();
        let seller = nearest_label(&window, &self.cfg.seller_labels);
        let buyer = nearest_label(&window, &self.cfg.buyer_labels);
        match (seller, buyer) {
            (Some(s), Some(b)) => Some(if s > b { RoleHint::Seller } else { RoleHint::Buyer }),
            (Some(_), None) => Some(RoleHint::Seller),
            (None, Some(_)) => Some(RoleHint::Buyer),
            (None, None) => None,
        }
    }

    /// Party names: the rest of the line after a party label.
    fn propose_names(&self, text: &str, out: &mut Vec<RawCandidate>) {
        let sets = [
            (FieldName::SellerName, &self.cfg.seller_labels, RoleHint::Seller),
            (FieldName::BuyerName, &self.cfg.buyer_labels, RoleHint::Buyer),
        ];
        for (field, labels, role) in sets {
            for label in labels.iter() {
                let pattern = format!(r"(?im)^\s*{}\s*[:\-]\s*(.+)$", regex::escape(label));
                let Ok(re) = Regex::new(&pattern) else {
                    continue;
                };
                for cap in re.captures_iter(text) {
                    let m = cap.get(1).unwrap();
                    out.push(RawCandidate {
                        field,
                        text: m.as_str().to_string(),
                        source_offset: m.start(),
                        role_hint: Some(role),
                    });
                }
            }
        }
    }

    /// Label-anchored amounts: each synonym followed by a number
    /// becomes a candidate for its field.
    fn propose_amounts(&self, text: &str, out: &mut Vec<RawCandidate>) {
        let t = &self.cfg.synonyms;
        let sets: [(FieldName, &[String]); 5] = [
            (FieldName::SubAmount, &t.sub_amount),
            (FieldName::Igst, &t.igst),
            (FieldName::Cgst, &t.cgst),
            (FieldName::Sgst, &t.sgst),
            (FieldName::TotalAmount, &t.total_amount),
        ];
        for (field, synonyms) in sets {
            for synonym in synonyms {
                let pattern = format!(
                    r"(?i)\b{}\b\s*[:\-]?\s*(?:₹|Rs\.?|INR)?\s*(\d[\d,]*\.?\d*)",
                    regex::escape(synonym)
                );
                let Ok(re) = Regex::new(&pattern) else {
                    continue;
                };
                for cap in re.captures_iter(text) {
                    let m = cap.get(1).unwrap();
                    out.push(RawCandidate {
                        field,
                        text: m.as_str().to_string(),
                        source_offset: m.start(),
                        role_hint: None,
                    });
                }
            }
        }
    }
}

fn nearest_label(window: &str, labels: &[String]) -> Option<usize> {
    labels
        .iter()
        .filter_map(|l| window.rfind(&l.to_lowercase()))
        .max()
}

fn propose_invoice_numbers(text: &str, out: &mut Vec<RawCandidate>) {
    // Matches "Invoice No." / "Invoice Number" / "Invoice #" followed by
    // optional punctuation then the value.
    let re = Regex::new(r"(?i)Invoice\s*(?:No|Number|#)\.?\s*[:\-]?\s*([A-Za-z0-9/\-]+)").unwrap();
    for cap in re.captures_iter(text) {
        let m = cap.get(1).unwrap();
        out.push(RawCandidate {
            field: FieldName::InvoiceNumber,
            text: m.as_str().to_string(),
            source_offset: m.start(),
            role_hint: None,
        });
    }
}

fn propose_dates(text: &str, out: &mut Vec<RawCandidate>) {
    // "Date" (or "Invoice Date" / "Dated") followed by any supported form:
    // ISO, numeric day-first, or textual month.
    let re = Regex::new(
        r"(?i)Date[d]?\s*[:\-]?\s*(\d{4}-\d{1,2}-\d{1,2}|\d{1,2}[/\-.]\d{1,2}[/\-.]\d{2,4}|\d{1,2}(?:st|nd|rd|th)?\s+[A-Za-z]{3,9},?\s+\d{4}|[A-Za-z]{3,9}\s+\d{1,2},?\s+\d{4})",
    )
    .unwrap();
    for cap in re.captures_iter(text) {
        let m = cap.get(1).unwrap();
        out.push(RawCandidate {
            field: FieldName::InvoiceDate,
            text: m.as_str().to_string(),
            source_offset: m.start(),
            role_hint: None,
        });
    }
}

fn propose_hsn_codes(text: &str, out: &mut Vec<RawCandidate>) {
    let re = Regex::new(r"(?i)HSN(?:/SAC)?(?:\s*Code)?\s*[:\-]?\s*(\d{4,8})").unwrap();
    for cap in re.captures_iter(text) {
        let m = cap.get(1).unwrap();
        out.push(RawCandidate {
            field: FieldName::HsnCode,
            text: m.as_str().to_string(),
            source_offset: m.start(),
            role_hint: None,
        });
    }
}

#[async_trait]
impl CandidateProposer for HeuristicProposer {
    async fn propose(&self, text: &str) -> Result<Vec<RawCandidate>, ProposalError> {
        Ok(self.extract(text))
    }
}
