//! OpenAI-compatible vision client.
//!
//! Two request shapes: a per-page transcription call carrying the rendered
//! page as a `data:image/png;base64` URL, and an optional consolidation call
//! that asks the model to merge the per-page texts into a single JSON
//! document.

use crate::config::VisionConfig;
use crate::error::{GarimpoError, Result};
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const REQUEST_RETRIES: u32 = 3;
const RETRY_BASE_DELAY_MS: u64 = 500;
const REQUEST_TIMEOUT_SECONDS: u64 = 180;

const PAGE_PROMPT: &str = "Transcreva todo o texto visível desta página de documento digitalizado. \
Preserve a estrutura (títulos, parágrafos, tabelas como texto alinhado) e não resuma nem omita nada. \
Responda apenas com o texto transcrito.";

const CONSOLIDATION_PROMPT: &str = "A seguir está o texto extraído página a página de um documento. \
Consolide-o em um único objeto JSON com os campos \"titulo\", \"resumo\" e \"conteudo_completo\". \
Responda apenas com o JSON.";

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

pub struct VisionClient {
    http: reqwest::Client,
    model: String,
    endpoint: String,
    api_key: String,
    temperature: f64,
}

impl VisionClient {
    pub fn new(config: &VisionConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| GarimpoError::validation("OPENAI_API_KEY is not set"))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECONDS))
            .build()
            .map_err(|e| GarimpoError::vision_with_source("Failed to build HTTP client", e))?;

        Ok(Self {
            http,
            model: config.model.clone(),
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            temperature: config.temperature,
        })
    }

    /// Transcribe one rendered page.
    pub async fn describe_page(&self, png_bytes: &[u8], page: usize, total_pages: usize) -> Result<String> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(png_bytes);
        let body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [{
                "role": "user",
                "content": [
                    {
                        "type": "text",
                        "text": format!("{} (página {} de {})", PAGE_PROMPT, page, total_pages),
                    },
                    {
                        "type": "image_url",
                        "image_url": {
                            "url": format!("data:image/png;base64,{}", encoded),
                        },
                    },
                ],
            }],
        });

        self.send_with_retry(body).await
    }

    /// Merge per-page texts into a consolidated JSON document.
    pub async fn consolidate(&self, full_text: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [{
                "role": "user",
                "content": format!("{}\n\n{}", CONSOLIDATION_PROMPT, full_text),
            }],
        });

        self.send_with_retry(body).await
    }

    async fn send_with_retry(&self, body: serde_json::Value) -> Result<String> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.send(&body).await {
                Ok(content) => return Ok(content),
                Err(err) if err.is_transient() && attempt < REQUEST_RETRIES => {
                    let delay = Duration::from_millis(RETRY_BASE_DELAY_MS * u64::from(attempt));
                    tracing::warn!(attempt, error = %err, "vision request failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn send(&self, body: &serde_json::Value) -> Result<String> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| GarimpoError::vision_with_source("Request failed", e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&text)
                .ok()
                .and_then(|r| r.error)
                .map(|e| e.message)
                .unwrap_or(text);
            // 4xx responses are permanent (bad key, bad request); 5xx and
            // 429 are worth retrying.
            if status.is_server_error() || status.as_u16() == 429 {
                return Err(GarimpoError::vision(format!("API error {}: {}", status, detail)));
            }
            return Err(GarimpoError::validation(format!("API rejected request {}: {}", status, detail)));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| GarimpoError::vision_with_source("Malformed API response", e))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| GarimpoError::vision("API response contained no choices"))
    }
}

/// Validate that a consolidation response is parseable JSON, tolerating a
/// markdown code fence around it.
pub fn parse_consolidated_json(content: &str) -> Result<serde_json::Value> {
    let trimmed = content.trim();
    let stripped = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .unwrap_or(trimmed);
    let value: serde_json::Value = serde_json::from_str(stripped.trim())?;
    Ok(value)
}
