// src/normalize.rs

use crate::config::NormalizerSection;
use crate::error::NormalizationError;
use crate::model::{
    Candidate, FieldName, Gstin, InvoiceDate, IssueKind, Money, NormalizedValue, RawCandidate,
    ValidationIssue,
};
use regex::Regex;
use std::collections::BTreeMap;
use tracing::debug;

/// Canonicalize one raw candidate into the typed value its field expects.
///
/// A failure here is per-candidate and recoverable: the caller drops the
/// candidate and keeps going.
pub fn normalize(
    candidate: &RawCandidate,
    cfg: &NormalizerSection,
) -> Result<NormalizedValue, NormalizationError> {
    match candidate.field {
        FieldName::SellerName | FieldName::BuyerName => {
            Ok(NormalizedValue::Text(clean_text(&candidate.text)?))
        }
        FieldName::SellerGst | FieldName::BuyerGst => {
            Ok(NormalizedValue::Gstin(normalize_gstin(&candidate.text)?))
        }
        FieldName::InvoiceNumber => Ok(NormalizedValue::Identifier(normalize_invoice_number(
            &candidate.text,
            cfg,
        )?)),
        FieldName::InvoiceDate => Ok(NormalizedValue::Date(normalize_date(&candidate.text)?)),
        FieldName::HsnCode => Ok(NormalizedValue::Identifier(clean_text(&candidate.text)?)),
        FieldName::SubAmount
        | FieldName::Igst
        | FieldName::Cgst
        | FieldName::Sgst
        | FieldName::TotalAmount => Ok(NormalizedValue::Money(normalize_money(&candidate.text)?)),
    }
}

/// Trim and collapse the whitespace/line-break artifacts that PDF column
/// extraction leaves behind.
fn clean_text(raw: &str) -> Result<String, NormalizationError> {
    let cleaned = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        return Err(NormalizationError::EmptyText);
    }
    Ok(cleaned)
}

/// GSTINs are 15 chars of `[A-Z0-9]`; internal whitespace (a common
/// extraction artifact) is stripped first.
fn normalize_gstin(raw: &str) -> Result<Gstin, NormalizationError> {
    let stripped: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let valid_shape = stripped.len() == 15
        && stripped
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
    if !valid_shape {
        return Err(NormalizationError::MalformedGstin(raw.trim().to_string()));
    }
    Ok(Gstin::new_unchecked(stripped))
}

fn normalize_invoice_number(
    raw: &str,
    cfg: &NormalizerSection,
) -> Result<String, NormalizationError> {
    let cleaned = clean_text(raw)?;
    for pattern in &cfg.reference_denylist {
        let Ok(re) = Regex::new(pattern) else {
            continue;
        };
        if re.is_match(&cleaned) {
            return Err(NormalizationError::LooksLikeReferenceNumber(cleaned));
        }
    }
    Ok(cleaned)
}

/// Strip currency decoration and parse an INR amount. Negative values
/// are rejected; amount fields on a GST invoice are never negative.
fn normalize_money(raw: &str) -> Result<Money, NormalizationError> {
    let display = clean_text(raw)?;

    let mut s = display.as_str();
    for prefix in ["₹", "Rs.", "Rs", "INR"] {
        s = s.trim_start_matches(prefix).trim_start();
    }
    // "1,180/-" is a common Indian rendering of a whole-rupee amount.
    s = s.trim_end_matches("/-").trim_end();
    let bare: String = s.chars().filter(|c| *c != ',' && *c != ' ').collect();

    let value: f64 = bare
        .parse()
        .map_err(|_| NormalizationError::UnparseableAmount(display.clone()))?;
    if value < 0.0 {
        return Err(NormalizationError::NegativeAmount(display));
    }
    Ok(Money { display, value })
}

/// Parse the date formats seen on Indian invoices and emit `dd/mm/yyyy`.
///
/// Ambiguous numeric dates (`04/05/2024`) are read day-first. That is a
/// fixed policy, not inferred per document.
fn normalize_date(raw: &str) -> Result<InvoiceDate, NormalizationError> {
    let cleaned = clean_text(raw)?;
    let unrecognized = || NormalizationError::UnrecognizedDate(cleaned.clone());

    // ISO yyyy-mm-dd first; its 4-digit lead keeps it out of the
    // day-first numeric branch.
    let iso = Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})$").unwrap();
    if let Some(cap) = iso.captures(&cleaned) {
        return build_date(&cap[3], &cap[2], &cap[1]).ok_or_else(unrecognized);
    }

    // Numeric slash/dash forms, day-first.
    let numeric = Regex::new(r"^(\d{1,2})[/\-.](\d{1,2})[/\-.](\d{2,4})$").unwrap();
    if let Some(cap) = numeric.captures(&cleaned) {
        return build_date(&cap[1], &cap[2], &cap[3]).ok_or_else(unrecognized);
    }

    // "19 Apr 2024" / "19th April, 2024"
    let day_first_textual =
        Regex::new(r"^(\d{1,2})(?:st|nd|rd|th)?\s+([A-Za-z]+),?\s+(\d{4})$").unwrap();
    if let Some(cap) = day_first_textual.captures(&cleaned) {
        let month = month_number(&cap[2]).ok_or_else(unrecognized)?;
        return build_date(&cap[1], &month.to_string(), &cap[3]).ok_or_else(unrecognized);
    }

    // "April 19, 2024"
    let month_first_textual = Regex::new(r"^([A-Za-z]+)\s+(\d{1,2}),?\s+(\d{4})$").unwrap();
    if let Some(cap) = month_first_textual.captures(&cleaned) {
        let month = month_number(&cap[1]).ok_or_else(unrecognized)?;
        return build_date(&cap[2], &month.to_string(), &cap[3]).ok_or_else(unrecognized);
    }

    Err(unrecognized())
}

fn month_number(name: &str) -> Option<u8> {
    let lower = name.to_lowercase();
    let prefix = lower.get(..3)?;
    let n = match prefix {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(n)
}

/// Assemble and calendar-check a date. Two-digit years are read as 20xx.
fn build_date(day: &str, month: &str, year: &str) -> Option<InvoiceDate> {
    let day: u8 = day.parse().ok()?;
    let month: u8 = month.parse().ok()?;
    let mut year: u16 = year.parse().ok()?;
    if year < 100 {
        year += 2000;
    }
    // time's calendar rules catch Feb 30 and friends.
    let month_enum = time::Month::try_from(month).ok()?;
    time::Date::from_calendar_date(year as i32, month_enum, day).ok()?;
    Some(InvoiceDate { day, month, year })
}

/// All surviving candidates for one document, grouped per field, plus
/// the soft notes for everything that was dropped.
#[derive(Debug, Default)]
pub struct CandidatePool {
    fields: BTreeMap<FieldName, Vec<Candidate>>,
    pub notes: Vec<ValidationIssue>,
}

impl CandidatePool {
    /// Normalize every raw candidate. Failures become soft notes, in
    /// input order, and never abort the document.
    pub fn build(raw: &[RawCandidate], cfg: &NormalizerSection) -> Self {
        let mut pool = CandidatePool::default();
        for candidate in raw {
            match normalize(candidate, cfg) {
                Ok(value) => {
                    pool.fields.entry(candidate.field).or_default().push(Candidate {
                        value,
                        source_offset: candidate.source_offset,
                        role_hint: candidate.role_hint,
                    });
                }
                Err(e) => {
                    debug!(field = ?candidate.field, text = %candidate.text, error = %e, "Dropped candidate");
                    pool.notes.push(ValidationIssue::new(
                        IssueKind::CandidateDropped,
                        vec![candidate.field],
                        format!("{:?}: {e}", candidate.text),
                    ));
                }
            }
        }
        pool
    }

    pub fn get(&self, field: FieldName) -> &[Candidate] {
        self.fields.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> NormalizerSection {
        NormalizerSection::default()
    }

    fn raw(field: FieldName, text: &str) -> RawCandidate {
        RawCandidate {
            field,
            text: text.to_string(),
            source_offset: 0,
            role_hint: None,
        }
    }

    #[test]
    fn iso_date_becomes_day_first() {
        let d = normalize_date("2024-04-19").unwrap();
        assert_eq!(d.to_string(), "19/04/2024");
    }

    #[test]
    fn textual_dates_parse() {
        assert_eq!(normalize_date("19 Apr 2024").unwrap().to_string(), "19/04/2024");
        assert_eq!(normalize_date("April 19, 2024").unwrap().to_string(), "19/04/2024");
        assert_eq!(normalize_date("3rd February 2025").unwrap().to_string(), "03/02/2025");
    }

    #[test]
    fn ambiguous_numeric_date_is_day_first() {
        let d = normalize_date("04/05/2024").unwrap();
        assert_eq!((d.day, d.month), (4, 5));
    }

    #[test]
    fn already_canonical_date_is_unchanged() {
        let d = normalize_date("19/04/2024").unwrap();
        assert_eq!(d.to_string(), "19/04/2024");
    }

    #[test]
    fn impossible_calendar_date_rejected() {
        assert!(matches!(
            normalize_date("30/02/2024"),
            Err(NormalizationError::UnrecognizedDate(_))
        ));
    }

    #[test]
    fn garbage_date_rejected() {
        assert!(normalize_date("sometime in spring").is_err());
    }

    #[test]
    fn money_strips_currency_decoration() {
        let m = normalize_money("₹1,180.00").unwrap();
        assert_eq!(m.cents(), 118000);
        assert_eq!(m.display, "₹1,180.00");

        assert_eq!(normalize_money("Rs. 500").unwrap().cents(), 50000);
        assert_eq!(normalize_money("1,180/-").unwrap().cents(), 118000);
        assert_eq!(normalize_money("INR 2500").unwrap().cents(), 250000);
    }

    #[test]
    fn negative_amount_rejected() {
        assert!(matches!(
            normalize_money("-50.00"),
            Err(NormalizationError::NegativeAmount(_))
        ));
    }

    #[test]
    fn unparseable_amount_rejected() {
        assert!(matches!(
            normalize_money("N/A"),
            Err(NormalizationError::UnparseableAmount(_))
        ));
    }

    #[test]
    fn gstin_internal_whitespace_stripped() {
        let g = normalize_gstin("27AAAAA 0000A1Z5").unwrap();
        assert_eq!(g.as_str(), "27AAAAA0000A1Z5");
    }

    #[test]
    fn gstin_wrong_length_rejected() {
        assert!(matches!(
            normalize_gstin("27AAAAA0000A1Z"),
            Err(NormalizationError::MalformedGstin(_))
        ));
    }

    #[test]
    fn gstin_lowercase_rejected() {
        assert!(normalize_gstin("27aaaaa0000a1z5").is_err());
    }

    #[test]
    fn invoice_number_denylist_applies() {
        assert!(matches!(
            normalize_invoice_number("PRN-2024-889", &cfg()),
            Err(NormalizationError::LooksLikeReferenceNumber(_))
        ));
        assert!(normalize_invoice_number("12345678901234", &cfg()).is_err());
        assert_eq!(
            normalize_invoice_number("INV/2024/001", &cfg()).unwrap(),
            "INV/2024/001"
        );
    }

    #[test]
    fn name_whitespace_collapsed() {
        let v = normalize(&raw(FieldName::SellerName, "  Acme\n  Traders \t Pvt Ltd "), &cfg());
        assert_eq!(
            v.unwrap(),
            NormalizedValue::Text("Acme Traders Pvt Ltd".to_string())
        );
    }

    #[test]
    fn pool_drops_bad_candidates_as_soft_notes() {
        let candidates = vec![
            raw(FieldName::Igst, "180.00"),
            raw(FieldName::Igst, "minus one"),
            raw(FieldName::SellerGst, "too short"),
        ];
        let pool = CandidatePool::build(&candidates, &cfg());
        assert_eq!(pool.get(FieldName::Igst).len(), 1);
        assert!(pool.get(FieldName::SellerGst).is_empty());
        assert_eq!(pool.notes.len(), 2);
        assert!(pool.notes.iter().all(|n| n.kind == IssueKind::CandidateDropped));
    }
}
