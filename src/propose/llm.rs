// src/propose/llm.rs

use super::CandidateProposer;
use crate::config::{EndpointSection, LlmBackend, LlmSection};
use crate::error::ProposalError;
use crate::model::{FieldName, RawCandidate, RoleHint};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// The prompt that instructs the model to extract GST invoice fields.
const SYSTEM_PROMPT: &str = r#"You are a smart accountant and invoice reader.
You analyze the text of an Indian GST invoice extracted from a PDF. The text is
complete but may contain misleading or inconsistent line breaks; read it with
logical structure and Indian invoice conventions in mind.

Extract the fields below and return ONLY a JSON object with exactly these keys:
{
  "Seller Name": "",
  "Seller GST": "",
  "Buyer Name": "",
  "Buyer GST": "",
  "Invoice Number": "",
  "Invoice Date": "",
  "HSN Code": "",
  "Sub Amount": "",
  "IGST": "",
  "CGST": "",
  "SGST": "",
  "Total Amount": ""
}

Rules:
- Buyer GST must be different from Seller GST; take the GST nearest to each
  party's name, with no spaces inside the number.
- Invoice Number is the unique id (e.g. INV/2024/001); never a PRN or other
  reference number.
- Invoice Date sits close to the invoice number; copy it verbatim from the text.
- HSN Code: one unique code or null if several distinct codes appear.
- Sub Amount is the amount before taxes (labels like Subtotal, Taxable Amount).
- Either IGST or (CGST and SGST) appears, never both; amounts in INR, not
  percentages.
- Total Amount is the grand total after taxes.
- Use null for anything you cannot determine.
- Return ONLY the JSON object, no markdown fences, no commentary."#;

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Resolved endpoint configuration ready to make API calls.
struct ResolvedEndpoint {
    base_url: String,
    model: String,
    api_key: String,
}

/// Resolve the LLM config section into a concrete endpoint.
fn resolve_endpoint(llm: &LlmSection) -> Result<ResolvedEndpoint, ProposalError> {
    match llm.backend {
        LlmBackend::Ollama => {
            let EndpointSection { base_url, model } = llm.ollama.clone();
            info!(url = %base_url, model = %model, "Using Ollama (local) backend");
            Ok(ResolvedEndpoint {
                base_url,
                model,
                api_key: "ollama".to_string(), // required by API but ignored
            })
        }
        LlmBackend::Remote => {
            let api_key = std::env::var("LLM_API_KEY").map_err(|_| {
                ProposalError::Backend("LLM_API_KEY env var required for remote backend".into())
            })?;
            let EndpointSection { base_url, model } = llm.remote.clone();
            info!(url = %base_url, model = %model, "Using remote API backend");
            Ok(ResolvedEndpoint {
                base_url,
                model,
                api_key,
            })
        }
        LlmBackend::Heuristics => Err(ProposalError::Backend(
            "heuristics backend selected, LLM proposer not applicable".into(),
        )),
    }
}

/// Check if the Ollama server is reachable.
async fn check_ollama_health(client: &Client, base_url: &str) -> bool {
    // Ollama's health endpoint is at the root (not under /v1)
    let health_url = base_url.trim_end_matches("/v1").trim_end_matches("/v1/");

    match client
        .get(health_url)
        .timeout(std::time::Duration::from_secs(3))
        .send()
        .await
    {
        Ok(resp) => {
            if resp.status().is_success() {
                info!("Ollama server is reachable");
                true
            } else {
                warn!(status = %resp.status(), "Ollama server returned non-OK status");
                false
            }
        }
        Err(e) => {
            warn!(error = %e, "Ollama server not reachable");
            false
        }
    }
}

/// Extract the outermost JSON object from a string that may contain
/// surrounding text (e.g. thinking tokens from local models).
fn extract_json_object(s: &str) -> Result<&str, ProposalError> {
    let start = s
        .find('{')
        .ok_or_else(|| ProposalError::MalformedResponse("no '{' in response".into()))?;
    let end = s
        .rfind('}')
        .ok_or_else(|| ProposalError::MalformedResponse("no '}' in response".into()))?;
    if end <= start {
        return Err(ProposalError::MalformedResponse(
            "malformed JSON in response".into(),
        ));
    }
    Ok(&s[start..=end])
}

/// Map the model's output keys onto our field enum.
fn field_for_key(key: &str) -> Option<FieldName> {
    FieldName::ALL.into_iter().find(|f| f.label() == key)
}

/// Turn the model's flat JSON object into offset-tagged candidates by
/// locating each value back in the source text. A value the model
/// invented (not present in the text) gets offset 0 and still competes.
fn candidates_from_json(text: &str, json: &serde_json::Value) -> Vec<RawCandidate> {
    let Some(map) = json.as_object() else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for (key, value) in map {
        let Some(field) = field_for_key(key) else {
            continue;
        };
        let value_text = match value {
            serde_json::Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
            serde_json::Value::Number(n) => n.to_string(),
            _ => continue, // null or empty
        };
        let source_offset = text.find(&value_text).unwrap_or(0);
        let role_hint = match field {
            FieldName::SellerGst => Some(RoleHint::Seller),
            FieldName::BuyerGst => Some(RoleHint::Buyer),
            _ => None,
        };
        out.push(RawCandidate {
            field,
            text: value_text,
            source_offset,
            role_hint,
        });
    }
    out
}

/// OpenAI-compatible chat-completions proposer (Ollama or a remote API).
pub struct LlmProposer {
    client: Client,
    config: LlmSection,
}

impl LlmProposer {
    pub fn new(config: LlmSection) -> Self {
        LlmProposer {
            client: Client::new(),
            config,
        }
    }

    async fn query(&self, text: &str) -> Result<Vec<RawCandidate>, ProposalError> {
        let endpoint = resolve_endpoint(&self.config)?;

        if self.config.backend == LlmBackend::Ollama
            && !check_ollama_health(&self.client, &endpoint.base_url).await
        {
            return Err(ProposalError::Backend(format!(
                "Ollama is not running at {}. Start it with: ollama serve",
                endpoint.base_url
            )));
        }

        // Truncate very long texts to stay within context limits
        let max_chars = 12_000;
        let truncated = match text.char_indices().nth(max_chars) {
            Some((i, _)) => &text[..i],
            None => text,
        };

        let request = ChatRequest {
            model: endpoint.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: format!("Extract the invoice fields from this text:\n\n{truncated}"),
                },
            ],
            temperature: 0.0,
        };

        let url = format!("{}/chat/completions", endpoint.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", endpoint.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| ProposalError::Backend(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProposalError::Backend(format!("LLM API error {status}: {body}")));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProposalError::MalformedResponse(e.to_string()))?;
        let content = chat_response
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| ProposalError::MalformedResponse("empty response".into()))?;

        // Strip markdown fences if the model added them despite instructions
        let json_str = content
            .trim()
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim();
        let json_str = extract_json_object(json_str)?;

        let parsed: serde_json::Value = serde_json::from_str(json_str)
            .map_err(|e| ProposalError::MalformedResponse(e.to_string()))?;

        let candidates = candidates_from_json(text, &parsed);
        info!(count = candidates.len(), "LLM proposed candidates");
        Ok(candidates)
    }
}

#[async_trait]
impl CandidateProposer for LlmProposer {
    async fn propose(&self, text: &str) -> Result<Vec<RawCandidate>, ProposalError> {
        self.query(text).await
    }
}
