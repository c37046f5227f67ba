// src/validate.rs

use crate::config::ValidationSection;
use crate::model::{FieldName, IssueKind, ValidationIssue};
use crate::resolve::ResolvedFields;

/// Apply the GST cross-field rules in a fixed order, collecting every
/// applicable issue. An amount counts as present only when it resolved
/// to a non-zero value.
pub fn validate(resolved: &ResolvedFields, cfg: &ValidationSection) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    let igst = resolved.nonzero_money(FieldName::Igst);
    let cgst = resolved.nonzero_money(FieldName::Cgst);
    let sgst = resolved.nonzero_money(FieldName::Sgst);
    let sub = resolved.money(FieldName::SubAmount);
    let total = resolved.money(FieldName::TotalAmount);

    let has_pair = cgst.is_some() && sgst.is_some();
    let partial_pair = cgst.is_some() != sgst.is_some();

    // R1: IGST and CGST/SGST are mutually exclusive regimes.
    if igst.is_some() && (cgst.is_some() || sgst.is_some()) {
        issues.push(ValidationIssue::new(
            IssueKind::ConflictingTaxRegime,
            vec![FieldName::Igst, FieldName::Cgst, FieldName::Sgst],
            "both IGST and CGST/SGST carry non-zero amounts",
        ));
    }

    // R2: some regime must be present: either IGST or the complete
    // CGST/SGST pair. A lone CGST or SGST also fires R3; the rules are
    // collected independently.
    if igst.is_none() && !has_pair {
        issues.push(ValidationIssue::new(
            IssueKind::NoTaxRegimeFound,
            vec![FieldName::Igst, FieldName::Cgst, FieldName::Sgst],
            "neither IGST nor a CGST/SGST pair was found",
        ));
    }

    // R3: CGST and SGST always appear together.
    if partial_pair {
        let found = if cgst.is_some() { "CGST" } else { "SGST" };
        issues.push(ValidationIssue::new(
            IssueKind::IncompleteCgstSgstPair,
            vec![FieldName::Cgst, FieldName::Sgst],
            format!("{found} is non-zero but its counterpart is absent or zero"),
        ));
    }

    // R4: the pre-tax amount must be strictly below the grand total.
    if let (Some(sub), Some(total)) = (sub, total) {
        if sub.cents() >= total.cents() {
            issues.push(ValidationIssue::new(
                IssueKind::SubAmountNotLessThanTotal,
                vec![FieldName::SubAmount, FieldName::TotalAmount],
                format!(
                    "sub amount {:.2} is not less than total {:.2}",
                    sub.value, total.value
                ),
            ));
        }
    }

    // R5: arithmetic closure, only meaningful when exactly one regime
    // is active (a conflicted or absent regime has no defined tax sum).
    let tax_cents = match (igst, has_pair) {
        (Some(igst), false) => Some(igst.cents()),
        (None, true) => Some(cgst.unwrap().cents() + sgst.unwrap().cents()),
        _ => None,
    };
    if let (Some(sub), Some(total), Some(tax)) = (sub, total, tax_cents) {
        let expected = sub.cents() + tax;
        let delta = (expected - total.cents()).abs();
        let tolerance = (cfg.tolerance * 100.0).round() as i64;
        if delta > tolerance {
            issues.push(ValidationIssue::new(
                IssueKind::TaxArithmeticMismatch,
                vec![FieldName::SubAmount, FieldName::TotalAmount],
                format!(
                    "expected {:.2}, found {:.2}, delta {:.2}",
                    expected as f64 / 100.0,
                    total.value,
                    delta as f64 / 100.0
                ),
            ));
        }
    }

    // R6: one party invoicing itself signals a resolution error.
    if let (Some(seller), Some(buyer)) = (
        resolved.gstin(FieldName::SellerGst),
        resolved.gstin(FieldName::BuyerGst),
    ) {
        if seller == buyer {
            issues.push(ValidationIssue::new(
                IssueKind::SellerBuyerGstCollision,
                vec![FieldName::SellerGst, FieldName::BuyerGst],
                format!("seller and buyer share GSTIN {seller}"),
            ));
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NormalizerSection, ResolverSection};
    use crate::model::RawCandidate;
    use crate::normalize::CandidatePool;
    use crate::resolve::Resolver;

    fn resolved(fields: &[(FieldName, &str)]) -> ResolvedFields {
        let raws: Vec<RawCandidate> = fields
            .iter()
            .enumerate()
            .map(|(i, (field, text))| RawCandidate {
                field: *field,
                text: text.to_string(),
                source_offset: i * 100,
                role_hint: None,
            })
            .collect();
        let pool = CandidatePool::build(&raws, &NormalizerSection::default());
        let cfg = ResolverSection::default();
        Resolver::new("", &cfg).resolve(&pool)
    }

    fn kinds(issues: &[ValidationIssue]) -> Vec<IssueKind> {
        issues.iter().map(|i| i.kind).collect()
    }

    #[test]
    fn consistent_igst_invoice_has_no_issues() {
        // Scenario 1 from the acceptance checklist.
        let r = resolved(&[
            (FieldName::SubAmount, "1000.00"),
            (FieldName::Igst, "180.00"),
            (FieldName::Cgst, "0"),
            (FieldName::Sgst, "0"),
            (FieldName::TotalAmount, "1180.00"),
            (FieldName::SellerGst, "27AAAAA0000A1Z5"),
            (FieldName::BuyerGst, "29BBBBB1111B2Z6"),
        ]);
        assert!(validate(&r, &ValidationSection::default()).is_empty());
    }

    #[test]
    fn both_regimes_nonzero_is_exactly_one_conflict() {
        // Scenario 2: the conflict must not drag an arithmetic issue along.
        let r = resolved(&[
            (FieldName::SubAmount, "1000.00"),
            (FieldName::Igst, "180.00"),
            (FieldName::Cgst, "90.00"),
            (FieldName::Sgst, "90.00"),
            (FieldName::TotalAmount, "1180.00"),
            (FieldName::SellerGst, "27AAAAA0000A1Z5"),
            (FieldName::BuyerGst, "29BBBBB1111B2Z6"),
        ]);
        assert_eq!(
            kinds(&validate(&r, &ValidationSection::default())),
            vec![IssueKind::ConflictingTaxRegime]
        );
    }

    #[test]
    fn arithmetic_mismatch_reports_delta() {
        // Scenario 3: 1000 + 90 + 90 = 1180, invoice claims 1300.
        let r = resolved(&[
            (FieldName::SubAmount, "1000.00"),
            (FieldName::Cgst, "90.00"),
            (FieldName::Sgst, "90.00"),
            (FieldName::TotalAmount, "1300.00"),
        ]);
        let issues = validate(&r, &ValidationSection::default());
        assert_eq!(kinds(&issues), vec![IssueKind::TaxArithmeticMismatch]);
        assert!(issues[0].detail.contains("delta 120.00"), "{}", issues[0].detail);
    }

    #[test]
    fn no_tax_at_all_is_missing_regime() {
        let r = resolved(&[
            (FieldName::SubAmount, "1000.00"),
            (FieldName::TotalAmount, "1180.00"),
        ]);
        assert_eq!(
            kinds(&validate(&r, &ValidationSection::default())),
            vec![IssueKind::NoTaxRegimeFound]
        );
    }

    #[test]
    fn lone_cgst_breaks_both_regime_rules() {
        let r = resolved(&[
            (FieldName::SubAmount, "1000.00"),
            (FieldName::Cgst, "90.00"),
            (FieldName::TotalAmount, "1090.00"),
        ]);
        // A half pair is no regime at all, and a broken pair; both
        // diagnostics apply.
        assert_eq!(
            kinds(&validate(&r, &ValidationSection::default())),
            vec![
                IssueKind::NoTaxRegimeFound,
                IssueKind::IncompleteCgstSgstPair
            ]
        );
    }

    #[test]
    fn zero_amounts_count_as_absent() {
        let r = resolved(&[
            (FieldName::SubAmount, "1000.00"),
            (FieldName::Igst, "180.00"),
            (FieldName::Cgst, "0.00"),
            (FieldName::Sgst, "0.00"),
            (FieldName::TotalAmount, "1180.00"),
        ]);
        assert!(validate(&r, &ValidationSection::default()).is_empty());
    }

    #[test]
    fn sub_not_below_total_flagged() {
        let r = resolved(&[
            (FieldName::SubAmount, "1180.00"),
            (FieldName::Igst, "180.00"),
            (FieldName::TotalAmount, "1180.00"),
        ]);
        let issues = validate(&r, &ValidationSection::default());
        assert_eq!(
            kinds(&issues),
            vec![
                IssueKind::SubAmountNotLessThanTotal,
                IssueKind::TaxArithmeticMismatch
            ]
        );
    }

    #[test]
    fn tolerance_absorbs_rounding() {
        let r = resolved(&[
            (FieldName::SubAmount, "1000.00"),
            (FieldName::Igst, "180.40"),
            (FieldName::TotalAmount, "1180.00"),
        ]);
        assert!(validate(&r, &ValidationSection::default()).is_empty());

        let tight = ValidationSection { tolerance: 0.10 };
        assert_eq!(
            kinds(&validate(&r, &tight)),
            vec![IssueKind::TaxArithmeticMismatch]
        );
    }

    #[test]
    fn identical_party_gstins_collide() {
        let r = resolved(&[
            (FieldName::SubAmount, "1000.00"),
            (FieldName::Igst, "180.00"),
            (FieldName::TotalAmount, "1180.00"),
            (FieldName::SellerGst, "27AAAAA0000A1Z5"),
            (FieldName::BuyerGst, "27AAAAA0000A1Z5"),
        ]);
        assert_eq!(
            kinds(&validate(&r, &ValidationSection::default())),
            vec![IssueKind::SellerBuyerGstCollision]
        );
    }

    #[test]
    fn revalidation_is_idempotent() {
        let r = resolved(&[
            (FieldName::SubAmount, "1000.00"),
            (FieldName::Cgst, "90.00"),
            (FieldName::Sgst, "90.00"),
            (FieldName::TotalAmount, "1300.00"),
        ]);
        let cfg = ValidationSection::default();
        assert_eq!(validate(&r, &cfg), validate(&r, &cfg));
    }
}
