// src/config.rs

use serde::Deserialize;
use std::{fs, path::Path};

/// Engine configuration, loaded from a TOML file. Every section has
/// usable defaults so the engine also runs with no config at all.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub normalizer: NormalizerSection,
    #[serde(default)]
    pub resolver: ResolverSection,
    #[serde(default)]
    pub validation: ValidationSection,
    #[serde(default)]
    pub batch: BatchSection,
    #[serde(default)]
    pub llm: LlmSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NormalizerSection {
    /// Regex denylist for invoice-number candidates that are really
    /// payment/reference numbers (PRN, IRN, acknowledgement numbers).
    #[serde(default = "default_reference_denylist")]
    pub reference_denylist: Vec<String>,
}

fn default_reference_denylist() -> Vec<String> {
    vec![
        r"(?i)^PRN".to_string(),
        r"(?i)^IRN".to_string(),
        r"(?i)^ACK".to_string(),
        // Long pure-numeric strings are reference numbers, not invoice numbers.
        r"^\d{14,}$".to_string(),
    ]
}

impl Default for NormalizerSection {
    fn default() -> Self {
        NormalizerSection {
            reference_denylist: default_reference_denylist(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolverSection {
    /// Label words anchoring the seller party in the source text.
    #[serde(default = "default_seller_labels")]
    pub seller_labels: Vec<String>,
    /// Label words anchoring the buyer party in the source text.
    #[serde(default = "default_buyer_labels")]
    pub buyer_labels: Vec<String>,
    /// How many bytes before an amount candidate to scan for a label synonym.
    #[serde(default = "default_label_window")]
    pub label_window: usize,
    #[serde(default)]
    pub synonyms: SynonymTable,
}

fn default_seller_labels() -> Vec<String> {
    ["seller", "sold by", "supplier", "from"]
        .map(String::from)
        .to_vec()
}

fn default_buyer_labels() -> Vec<String> {
    ["buyer", "bill to", "billed to", "customer", "consignee"]
        .map(String::from)
        .to_vec()
}

fn default_label_window() -> usize {
    48
}

impl Default for ResolverSection {
    fn default() -> Self {
        ResolverSection {
            seller_labels: default_seller_labels(),
            buyer_labels: default_buyer_labels(),
            label_window: default_label_window(),
            synonyms: SynonymTable::default(),
        }
    }
}

/// Per-amount-field label synonyms, matched case-insensitively in the
/// text just before a candidate.
#[derive(Debug, Clone, Deserialize)]
pub struct SynonymTable {
    #[serde(default = "default_sub_amount_synonyms")]
    pub sub_amount: Vec<String>,
    #[serde(default = "default_igst_synonyms")]
    pub igst: Vec<String>,
    #[serde(default = "default_cgst_synonyms")]
    pub cgst: Vec<String>,
    #[serde(default = "default_sgst_synonyms")]
    pub sgst: Vec<String>,
    #[serde(default = "default_total_amount_synonyms")]
    pub total_amount: Vec<String>,
}

fn default_sub_amount_synonyms() -> Vec<String> {
    [
        "subtotal",
        "sub total",
        "sub amount",
        "taxable amount",
        "taxable value",
        "tax'ble value",
        "amount before tax",
    ]
    .map(String::from)
    .to_vec()
}

fn default_igst_synonyms() -> Vec<String> {
    ["igst"].map(String::from).to_vec()
}

fn default_cgst_synonyms() -> Vec<String> {
    ["cgst"].map(String::from).to_vec()
}

fn default_sgst_synonyms() -> Vec<String> {
    ["sgst"].map(String::from).to_vec()
}

fn default_total_amount_synonyms() -> Vec<String> {
    [
        "grand total",
        "total amount",
        "amount after tax",
        "invoice total",
        "total",
    ]
    .map(String::from)
    .to_vec()
}

impl Default for SynonymTable {
    fn default() -> Self {
        SynonymTable {
            sub_amount: default_sub_amount_synonyms(),
            igst: default_igst_synonyms(),
            cgst: default_cgst_synonyms(),
            sgst: default_sgst_synonyms(),
            total_amount: default_total_amount_synonyms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidationSection {
    /// Allowed |sub + tax - total| slack in currency units, absorbing
    /// per-line rounding on real invoices.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

fn default_tolerance() -> f64 {
    1.00
}

impl Default for ValidationSection {
    fn default() -> Self {
        ValidationSection {
            tolerance: default_tolerance(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchSection {
    /// Cap on concurrent in-flight extraction/proposal calls.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    /// Per-document deadline covering extraction plus proposal.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_max_in_flight() -> usize {
    4
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for BatchSection {
    fn default() -> Self {
        BatchSection {
            max_in_flight: default_max_in_flight(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Which backend proposes field candidates from extracted text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmBackend {
    /// Regex heuristics only, no model call.
    #[default]
    Heuristics,
    /// Local Ollama server (OpenAI-compatible endpoint).
    Ollama,
    /// Remote OpenAI-compatible API; key comes from LLM_API_KEY.
    Remote,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    #[serde(default)]
    pub backend: LlmBackend,
    #[serde(default = "default_ollama_endpoint")]
    pub ollama: EndpointSection,
    #[serde(default = "default_remote_endpoint")]
    pub remote: EndpointSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        LlmSection {
            backend: LlmBackend::default(),
            ollama: default_ollama_endpoint(),
            remote: default_remote_endpoint(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointSection {
    pub base_url: String,
    pub model: String,
}

fn default_ollama_endpoint() -> EndpointSection {
    EndpointSection {
        base_url: "http://localhost:11434/v1".to_string(),
        model: "llama3".to_string(),
    }
}

fn default_remote_endpoint() -> EndpointSection {
    EndpointSection {
        base_url: "https://api.openai.com/v1".to_string(),
        model: "gpt-4o-mini".to_string(),
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        let cfg = Config::default();
        assert_eq!(cfg.validation.tolerance, 1.00);
        assert_eq!(cfg.batch.max_in_flight, 4);
        assert_eq!(cfg.llm.backend, LlmBackend::Heuristics);
        assert!(!cfg.normalizer.reference_denylist.is_empty());
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [validation]
            tolerance = 0.5

            [llm]
            backend = "ollama"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.validation.tolerance, 0.5);
        assert_eq!(cfg.llm.backend, LlmBackend::Ollama);
        assert_eq!(cfg.batch.timeout_secs, 120);
        assert_eq!(cfg.llm.ollama.model, "llama3");
    }
}
