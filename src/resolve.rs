// src/resolve.rs

use crate::config::ResolverSection;
use crate::model::{
    Candidate, FieldName, Gstin, InvoiceDate, IssueKind, Money, RoleHint, ValidationIssue,
};
use crate::normalize::CandidatePool;
use std::collections::BTreeMap;
use tracing::debug;

/// Per-field selection result. `Null` is a legitimate outcome (missing
/// field, or the HSN multiple-distinct-codes rule), not an error.
enum Outcome {
    Value(Candidate),
    Null,
    Ambiguous(String),
}

/// The resolver's output: at most one candidate per field, plus the
/// ambiguity issues it refused to guess through, in discovery order.
#[derive(Debug, Default)]
pub struct ResolvedFields {
    values: BTreeMap<FieldName, Candidate>,
    pub issues: Vec<ValidationIssue>,
}

impl ResolvedFields {
    pub fn get(&self, field: FieldName) -> Option<&Candidate> {
        self.values.get(&field)
    }

    pub fn text(&self, field: FieldName) -> Option<&str> {
        self.get(field).and_then(|c| c.value.as_text())
    }

    pub fn gstin(&self, field: FieldName) -> Option<&Gstin> {
        self.get(field).and_then(|c| c.value.as_gstin())
    }

    pub fn date(&self, field: FieldName) -> Option<&InvoiceDate> {
        self.get(field).and_then(|c| c.value.as_date())
    }

    pub fn money(&self, field: FieldName) -> Option<&Money> {
        self.get(field).and_then(|c| c.value.as_money())
    }

    /// An amount counts as present only when resolved and non-zero.
    pub fn nonzero_money(&self, field: FieldName) -> Option<&Money> {
        self.money(field).filter(|m| !m.is_zero())
    }
}

/// Picks the best surviving candidate per field using proximity and
/// label heuristics over the source text. Never guesses between equally
/// supported candidates: ties become `AmbiguousField` issues.
pub struct Resolver<'a> {
    text_lower: String,
    cfg: &'a ResolverSection,
}

impl<'a> Resolver<'a> {
    pub fn new(text: &str, cfg: &'a ResolverSection) -> Self {
        Resolver {
            text_lower: text.to_lowercase(),
            cfg,
        }
    }

    pub fn resolve(&self, pool: &CandidatePool) -> ResolvedFields {
        let mut out = ResolvedFields::default();

        // Names go first so their offsets can anchor the GST fields.
        for field in FieldName::ALL {
            let candidates = dedup(pool.get(field));
            let outcome = match candidates.len() {
                0 => Outcome::Null,
                1 => Outcome::Value(candidates[0].clone()),
                _ => self.pick_among(field, &candidates, pool, &out),
            };
            match outcome {
                Outcome::Value(c) => {
                    debug!(field = ?field, offset = c.source_offset, "Resolved");
                    out.values.insert(field, c);
                }
                Outcome::Null => {}
                Outcome::Ambiguous(detail) => {
                    debug!(field = ?field, detail = %detail, "Ambiguous");
                    out.issues.push(ValidationIssue::new(
                        IssueKind::AmbiguousField,
                        vec![field],
                        detail,
                    ));
                }
            }
        }
        out
    }

    fn pick_among(
        &self,
        field: FieldName,
        candidates: &[Candidate],
        pool: &CandidatePool,
        resolved: &ResolvedFields,
    ) -> Outcome {
        match field {
            FieldName::SellerGst | FieldName::BuyerGst => {
                self.pick_by_role(field, candidates, resolved)
            }
            FieldName::SellerName => {
                self.pick_nearest(field, candidates, &self.label_offsets(&self.cfg.seller_labels))
            }
            FieldName::BuyerName => {
                self.pick_nearest(field, candidates, &self.label_offsets(&self.cfg.buyer_labels))
            }
            // Invoice number and date co-locate on invoices; use the
            // other of the pair as the anchor.
            FieldName::InvoiceNumber => {
                self.pick_near_partner(field, candidates, pool.get(FieldName::InvoiceDate))
            }
            FieldName::InvoiceDate => {
                self.pick_near_partner(field, candidates, pool.get(FieldName::InvoiceNumber))
            }
            // Business rule: several distinct HSN codes on one invoice
            // mean the field is reported as null, not an error.
            FieldName::HsnCode => Outcome::Null,
            _ => self.pick_labeled_amount(field, candidates),
        }
    }

    /// Seller/Buyer GST selection: explicit role hints partition the
    /// pool first; proximity to the party's name (or to the party's
    /// label words in the text) breaks the remaining tie.
    fn pick_by_role(
        &self,
        field: FieldName,
        candidates: &[Candidate],
        resolved: &ResolvedFields,
    ) -> Outcome {
        let (wanted, name_field, labels) = if field == FieldName::SellerGst {
            (RoleHint::Seller, FieldName::SellerName, &self.cfg.seller_labels)
        } else {
            (RoleHint::Buyer, FieldName::BuyerName, &self.cfg.buyer_labels)
        };

        let hinted: Vec<Candidate> = candidates
            .iter()
            .filter(|c| c.role_hint == Some(wanted))
            .cloned()
            .collect();
        let pool: Vec<Candidate> = if hinted.is_empty() {
            // Unhinted candidates stay in play; candidates hinted to
            // some other role are out.
            candidates
                .iter()
                .filter(|c| c.role_hint.is_none())
                .cloned()
                .collect()
        } else {
            hinted
        };

        match pool.len() {
            0 => Outcome::Null,
            1 => Outcome::Value(pool[0].clone()),
            _ => {
                let anchors = match resolved.get(name_field) {
                    Some(name) => vec![name.source_offset],
                    None => self.label_offsets(labels),
                };
                self.pick_nearest(field, &pool, &anchors)
            }
        }
    }

    fn pick_near_partner(
        &self,
        field: FieldName,
        candidates: &[Candidate],
        partner: &[Candidate],
    ) -> Outcome {
        let anchors: Vec<usize> = partner.iter().map(|c| c.source_offset).collect();
        self.pick_nearest(field, candidates, &anchors)
    }

    /// Smallest offset distance to any anchor wins; an exact tie is
    /// surfaced as ambiguity rather than broken arbitrarily.
    fn pick_nearest(
        &self,
        field: FieldName,
        candidates: &[Candidate],
        anchors: &[usize],
    ) -> Outcome {
        if anchors.is_empty() {
            return Outcome::Ambiguous(format!(
                "{} has {} equally supported candidates and no anchor to rank them",
                field.label(),
                candidates.len()
            ));
        }
        let distance = |c: &Candidate| -> usize {
            anchors
                .iter()
                .map(|a| c.source_offset.abs_diff(*a))
                .min()
                .unwrap_or(usize::MAX)
        };
        let best = candidates.iter().min_by_key(|c| distance(c)).unwrap();
        let best_distance = distance(best);
        let tied = candidates
            .iter()
            .filter(|c| distance(c) == best_distance)
            .count();
        if tied > 1 {
            return Outcome::Ambiguous(format!(
                "{} candidates tie at distance {best_distance} from the nearest anchor",
                field.label()
            ));
        }
        Outcome::Value(best.clone())
    }

    /// Among several distinct amounts, prefer the single one that sits
    /// right after one of the field's label synonyms.
    fn pick_labeled_amount(&self, field: FieldName, candidates: &[Candidate]) -> Outcome {
        let synonyms = self.synonyms_for(field);
        let labeled: Vec<&Candidate> = candidates
            .iter()
            .filter(|c| self.has_label_before(c.source_offset, synonyms))
            .collect();
        match labeled.len() {
            1 => Outcome::Value(labeled[0].clone()),
            0 => Outcome::Ambiguous(format!(
                "{} has {} distinct amount candidates and none carries a known label",
                field.label(),
                candidates.len()
            )),
            n => Outcome::Ambiguous(format!(
                "{} has {n} labeled amount candidates",
                field.label()
            )),
        }
    }

    fn synonyms_for(&self, field: FieldName) -> &[String] {
        let t = &self.cfg.synonyms;
        match field {
            FieldName::SubAmount => &t.sub_amount,
            FieldName::Igst => &t.igst,
            FieldName::Cgst => &t.cgst,
            FieldName::Sgst => &t.sgst,
            FieldName::TotalAmount => &t.total_amount,
            _ => &[],
        }
    }

    /// Does any synonym occur in the window of text just before `offset`?
    fn has_label_before(&self, offset: usize, synonyms: &[String]) -> bool {
        let text = &self.text_lower;
        let mut end = offset.min(text.len());
        while end > 0 && !text.is_char_boundary(end) {
            end -= 1;
        }
        let mut start = end.saturating_sub(self.cfg.label_window);
        while start > 0 && !text.is_char_boundary(start) {
            start -= 1;
        }
        let window = &text[start..end];
        synonyms
            .iter()
            .any(|s| contains_word(window, &s.to_lowercase()))
    }

    /// Byte offsets of every case-insensitive occurrence of any label.
    fn label_offsets(&self, labels: &[String]) -> Vec<usize> {
        let mut offsets = Vec::new();
        for label in labels {
            let needle = label.to_lowercase();
            if needle.is_empty() {
                continue;
            }
            offsets.extend(self.text_lower.match_indices(&needle).map(|(i, _)| i));
        }
        offsets
    }
}

/// Whole-word occurrence check: `total` must not match inside
/// `Subtotal`.
fn contains_word(haystack: &str, needle: &str) -> bool {
    let mut from = 0;
    while let Some(i) = haystack[from..].find(needle) {
        let at = from + i;
        let end = at + needle.len();
        let before_ok = haystack[..at]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric());
        let after_ok = haystack[end..]
            .chars()
            .next()
            .is_none_or(|c| !c.is_alphanumeric());
        if before_ok && after_ok {
            return true;
        }
        from = end;
    }
    false
}

/// Collapse candidates whose normalized values compare equal, keeping
/// the earliest occurrence. Two mentions of the same GSTIN or the same
/// date are support, not ambiguity; a role hint from any of the merged
/// mentions is kept.
fn dedup(candidates: &[Candidate]) -> Vec<Candidate> {
    let mut sorted: Vec<Candidate> = candidates.to_vec();
    sorted.sort_by_key(|c| c.source_offset);
    let mut out: Vec<Candidate> = Vec::new();
    for c in sorted {
        match out.iter_mut().find(|kept| kept.value == c.value) {
            Some(kept) => {
                if kept.role_hint.is_none() {
                    kept.role_hint = c.role_hint;
                }
            }
            None => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NormalizerSection;
    use crate::model::RawCandidate;

    fn raw(field: FieldName, text: &str, offset: usize) -> RawCandidate {
        RawCandidate {
            field,
            text: text.to_string(),
            source_offset: offset,
            role_hint: None,
        }
    }

    fn hinted(field: FieldName, text: &str, offset: usize, role: RoleHint) -> RawCandidate {
        RawCandidate {
            role_hint: Some(role),
            ..raw(field, text, offset)
        }
    }

    fn resolve(text: &str, raws: Vec<RawCandidate>) -> ResolvedFields {
        let pool = CandidatePool::build(&raws, &NormalizerSection::default());
        let cfg = ResolverSection::default();
        Resolver::new(text, &cfg).resolve(&pool)
    }

    #[test]
    fn single_survivor_resolves_trivially() {
        let out = resolve("x", vec![raw(FieldName::Igst, "180.00", 10)]);
        assert_eq!(out.money(FieldName::Igst).unwrap().cents(), 18000);
        assert!(out.issues.is_empty());
    }

    #[test]
    fn buyer_gst_picks_candidate_nearest_buyer_label() {
        // "Buyer" label at offset 110; candidates at 120 and 900.
        let mut text = " ".repeat(110);
        text.push_str("Buyer:");
        text.push_str(&" ".repeat(1000));
        let out = resolve(
            &text,
            vec![
                raw(FieldName::BuyerGst, "29BBBBB1111B2Z6", 120),
                raw(FieldName::BuyerGst, "27AAAAA0000A1Z5", 900),
            ],
        );
        assert_eq!(
            out.gstin(FieldName::BuyerGst).unwrap().as_str(),
            "29BBBBB1111B2Z6"
        );
        assert!(out.issues.is_empty());
    }

    #[test]
    fn role_hints_partition_the_pool() {
        let out = resolve(
            "no labels here",
            vec![
                hinted(FieldName::SellerGst, "27AAAAA0000A1Z5", 50, RoleHint::Seller),
                hinted(FieldName::SellerGst, "29BBBBB1111B2Z6", 60, RoleHint::Buyer),
            ],
        );
        assert_eq!(
            out.gstin(FieldName::SellerGst).unwrap().as_str(),
            "27AAAAA0000A1Z5"
        );
    }

    #[test]
    fn gst_tie_with_no_anchor_is_ambiguous() {
        let out = resolve(
            "text without party labels",
            vec![
                raw(FieldName::BuyerGst, "29BBBBB1111B2Z6", 100),
                raw(FieldName::BuyerGst, "27AAAAA0000A1Z5", 200),
            ],
        );
        assert!(out.gstin(FieldName::BuyerGst).is_none());
        assert_eq!(out.issues.len(), 1);
        assert_eq!(out.issues[0].kind, IssueKind::AmbiguousField);
        assert_eq!(out.issues[0].fields, vec![FieldName::BuyerGst]);
    }

    #[test]
    fn repeated_gstin_mentions_are_support_not_ambiguity() {
        let out = resolve(
            "plain text",
            vec![
                raw(FieldName::SellerGst, "27AAAAA0000A1Z5", 40),
                raw(FieldName::SellerGst, "27AAAAA 0000A1Z5", 700),
            ],
        );
        assert_eq!(
            out.gstin(FieldName::SellerGst).unwrap().as_str(),
            "27AAAAA0000A1Z5"
        );
        assert!(out.issues.is_empty());
    }

    #[test]
    fn invoice_number_picks_candidate_near_the_date() {
        let out = resolve(
            "irrelevant",
            vec![
                raw(FieldName::InvoiceNumber, "INV/2024/001", 200),
                raw(FieldName::InvoiceNumber, "A67-2024-005", 850),
                raw(FieldName::InvoiceDate, "19/04/2024", 230),
            ],
        );
        assert_eq!(out.text(FieldName::InvoiceNumber), Some("INV/2024/001"));
    }

    #[test]
    fn hsn_multiple_distinct_codes_resolve_to_null() {
        let out = resolve(
            "x",
            vec![
                raw(FieldName::HsnCode, "8471", 10),
                raw(FieldName::HsnCode, "8471", 300),
                raw(FieldName::HsnCode, "8523", 500),
            ],
        );
        assert!(out.get(FieldName::HsnCode).is_none());
        // Explicit business rule, not ambiguity.
        assert!(out.issues.is_empty());
    }

    #[test]
    fn hsn_single_distinct_code_resolves() {
        let out = resolve(
            "x",
            vec![
                raw(FieldName::HsnCode, "8471", 10),
                raw(FieldName::HsnCode, "8471", 300),
            ],
        );
        assert_eq!(out.text(FieldName::HsnCode), Some("8471"));
    }

    #[test]
    fn labeled_amount_beats_unlabeled() {
        let text = "Freight 40.00 ........ Subtotal: 1000.00 IGST 180.00";
        let sub_offset = text.find("1000.00").unwrap();
        let out = resolve(
            text,
            vec![
                raw(FieldName::SubAmount, "40.00", text.find("40.00").unwrap()),
                raw(FieldName::SubAmount, "1000.00", sub_offset),
            ],
        );
        assert_eq!(out.money(FieldName::SubAmount).unwrap().cents(), 100000);
        assert!(out.issues.is_empty());
    }

    #[test]
    fn total_synonym_does_not_match_inside_subtotal() {
        let text = "Subtotal: 1000.00 ......... Total: 1180.00";
        let out = resolve(
            text,
            vec![
                raw(FieldName::TotalAmount, "1000.00", text.find("1000.00").unwrap()),
                raw(FieldName::TotalAmount, "1180.00", text.find("1180.00").unwrap()),
            ],
        );
        assert_eq!(out.money(FieldName::TotalAmount).unwrap().cents(), 118000);
        assert!(out.issues.is_empty());
    }

    #[test]
    fn duplicate_mention_contributes_its_role_hint() {
        // The first mention is unhinted; a later mention of the same
        // GSTIN carries the hint that settles the field.
        let out = resolve(
            "no party labels anywhere",
            vec![
                raw(FieldName::SellerGst, "27AAAAA0000A1Z5", 10),
                hinted(FieldName::SellerGst, "27AAAAA0000A1Z5", 500, RoleHint::Seller),
                raw(FieldName::SellerGst, "29BBBBB1111B2Z6", 60),
            ],
        );
        assert_eq!(
            out.gstin(FieldName::SellerGst).unwrap().as_str(),
            "27AAAAA0000A1Z5"
        );
        assert!(out.issues.is_empty());
    }

    #[test]
    fn unlabeled_distinct_amounts_are_ambiguous() {
        let text = "some 500.00 numbers 900.00 nearby";
        let out = resolve(
            text,
            vec![
                raw(FieldName::SubAmount, "500.00", 5),
                raw(FieldName::SubAmount, "900.00", 20),
            ],
        );
        assert!(out.money(FieldName::SubAmount).is_none());
        assert_eq!(out.issues.len(), 1);
        assert_eq!(out.issues[0].kind, IssueKind::AmbiguousField);
    }

    #[test]
    fn equal_amounts_collapse_to_one() {
        let out = resolve(
            "x",
            vec![
                raw(FieldName::TotalAmount, "1,180.00", 10),
                raw(FieldName::TotalAmount, "1180", 500),
            ],
        );
        assert_eq!(out.money(FieldName::TotalAmount).unwrap().cents(), 118000);
        assert!(out.issues.is_empty());
    }
}
