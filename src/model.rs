// src/model.rs

use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of fields we extract from a GST invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FieldName {
    SellerName,
    SellerGst,
    BuyerName,
    BuyerGst,
    InvoiceNumber,
    InvoiceDate,
    HsnCode,
    SubAmount,
    Igst,
    Cgst,
    Sgst,
    TotalAmount,
}

impl FieldName {
    pub const ALL: [FieldName; 12] = [
        FieldName::SellerName,
        FieldName::SellerGst,
        FieldName::BuyerName,
        FieldName::BuyerGst,
        FieldName::InvoiceNumber,
        FieldName::InvoiceDate,
        FieldName::HsnCode,
        FieldName::SubAmount,
        FieldName::Igst,
        FieldName::Cgst,
        FieldName::Sgst,
        FieldName::TotalAmount,
    ];

    /// Human-readable label, matching how the field appears on invoices.
    pub fn label(&self) -> &'static str {
        match self {
            FieldName::SellerName => "Seller Name",
            FieldName::SellerGst => "Seller GST",
            FieldName::BuyerName => "Buyer Name",
            FieldName::BuyerGst => "Buyer GST",
            FieldName::InvoiceNumber => "Invoice Number",
            FieldName::InvoiceDate => "Invoice Date",
            FieldName::HsnCode => "HSN Code",
            FieldName::SubAmount => "Sub Amount",
            FieldName::Igst => "IGST",
            FieldName::Cgst => "CGST",
            FieldName::Sgst => "SGST",
            FieldName::TotalAmount => "Total Amount",
        }
    }

    pub fn is_amount(&self) -> bool {
        matches!(
            self,
            FieldName::SubAmount
                | FieldName::Igst
                | FieldName::Cgst
                | FieldName::Sgst
                | FieldName::TotalAmount
        )
    }

    /// Seller/Buyer GST need role disambiguation when several GSTINs
    /// appear in one document.
    pub fn is_role_sensitive(&self) -> bool {
        matches!(self, FieldName::SellerGst | FieldName::BuyerGst)
    }
}

/// Which party a candidate is believed to belong to, when the proposal
/// collaborator can tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoleHint {
    Seller,
    Buyer,
    Neither,
}

/// One raw field-value proposal from the extraction collaborator.
///
/// Several candidates per field are expected and normal; the resolver
/// picks among them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCandidate {
    pub field: FieldName,
    pub text: String,
    /// Byte position of the candidate in the source text.
    pub source_offset: usize,
    pub role_hint: Option<RoleHint>,
}

/// A validated 15-character GST identification number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Gstin(String);

impl Gstin {
    /// Wrap an already-validated GSTIN string. The normalizer is the
    /// only producer; it guarantees 15 chars of `[A-Z0-9]`.
    pub(crate) fn new_unchecked(s: String) -> Self {
        Gstin(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Gstin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An invoice date, always rendered day-first as `dd/mm/yyyy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvoiceDate {
    pub day: u8,
    pub month: u8,
    pub year: u16,
}

impl fmt::Display for InvoiceDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}/{:02}/{:04}", self.day, self.month, self.year)
    }
}

impl Serialize for InvoiceDate {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A non-negative INR amount.
///
/// `display` keeps the precision the candidate was written with;
/// arithmetic and comparisons go through [`Money::cents`], which rounds
/// half-up to two decimals.
#[derive(Debug, Clone, Serialize)]
pub struct Money {
    pub display: String,
    pub value: f64,
}

impl Money {
    pub fn from_value(value: f64) -> Self {
        Money {
            display: format!("{value:.2}"),
            value,
        }
    }

    /// Amount in paise, rounded half-up. All cross-field comparisons
    /// happen in this unit.
    pub fn cents(&self) -> i64 {
        (self.value * 100.0).round() as i64
    }

    pub fn is_zero(&self) -> bool {
        self.cents() == 0
    }
}

impl PartialEq for Money {
    fn eq(&self, other: &Self) -> bool {
        self.cents() == other.cents()
    }
}

/// A normalized candidate value. The variant always matches the field's
/// declared kind; malformed inputs are rejected by the normalizer
/// instead of being wrapped here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum NormalizedValue {
    /// Names and other free text.
    Text(String),
    Gstin(Gstin),
    Date(InvoiceDate),
    Money(Money),
    /// Invoice numbers, HSN codes.
    Identifier(String),
}

impl NormalizedValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            NormalizedValue::Text(s) | NormalizedValue::Identifier(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_gstin(&self) -> Option<&Gstin> {
        match self {
            NormalizedValue::Gstin(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<&InvoiceDate> {
        match self {
            NormalizedValue::Date(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_money(&self) -> Option<&Money> {
        match self {
            NormalizedValue::Money(m) => Some(m),
            _ => None,
        }
    }
}

/// A normalized value together with the provenance the resolver needs.
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub value: NormalizedValue,
    pub source_offset: usize,
    pub role_hint: Option<RoleHint>,
}

/// Which GST regime the invoice uses. Exactly one is active in a
/// consistent invoice; the assembler refuses to build a profile when
/// both regimes carry non-zero amounts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "regime")]
pub enum TaxProfile {
    Igst { amount: Money },
    CgstSgst { cgst: Money, sgst: Money },
}

impl TaxProfile {
    /// Total tax in paise.
    pub fn total_cents(&self) -> i64 {
        match self {
            TaxProfile::Igst { amount } => amount.cents(),
            TaxProfile::CgstSgst { cgst, sgst } => cgst.cents() + sgst.cents(),
        }
    }
}

/// Classification of a validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueKind {
    // Hard failures (record becomes Invalid).
    ConflictingTaxRegime,
    NoTaxRegimeFound,
    IncompleteCgstSgstPair,
    SubAmountNotLessThanTotal,
    TaxArithmeticMismatch,
    SellerBuyerGstCollision,
    // Resolver could not pick between equally supported candidates
    // (record becomes Ambiguous unless a hard issue also exists).
    AmbiguousField,
    // Soft note: a candidate failed normalization and was dropped.
    CandidateDropped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Soft,
    Ambiguity,
    Hard,
}

impl IssueKind {
    pub fn severity(&self) -> Severity {
        match self {
            IssueKind::AmbiguousField => Severity::Ambiguity,
            IssueKind::CandidateDropped => Severity::Soft,
            _ => Severity::Hard,
        }
    }
}

/// One validation finding. Issue order within a record is discovery
/// order and stable, so tests can assert exact issue lists.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    pub fields: Vec<FieldName>,
    pub detail: String,
}

impl ValidationIssue {
    pub fn new(kind: IssueKind, fields: Vec<FieldName>, detail: impl Into<String>) -> Self {
        ValidationIssue {
            kind,
            fields,
            detail: detail.into(),
        }
    }
}

/// Overall verdict for one invoice record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "reasons")]
pub enum ValidationStatus {
    Valid,
    Ambiguous(Vec<ValidationIssue>),
    Invalid(Vec<ValidationIssue>),
}

impl ValidationStatus {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationStatus::Valid)
    }
}

/// The final structured record for one source document.
///
/// Built once by the assembler and never mutated afterwards; downstream
/// consumers get a fresh record for corrections, never a patched one.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceRecord {
    pub document_id: String,
    /// Length of the raw source text, kept for audit.
    pub source_text_len: usize,
    pub seller_name: Option<String>,
    pub seller_gst: Option<Gstin>,
    pub buyer_name: Option<String>,
    pub buyer_gst: Option<Gstin>,
    pub invoice_number: Option<String>,
    pub invoice_date: Option<InvoiceDate>,
    pub hsn_code: Option<String>,
    pub sub_amount: Option<Money>,
    pub tax: Option<TaxProfile>,
    pub total_amount: Option<Money>,
    /// Soft findings (dropped candidates) that do not affect the status.
    pub notes: Vec<ValidationIssue>,
    pub status: ValidationStatus,
}
