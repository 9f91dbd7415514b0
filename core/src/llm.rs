use crate::config::LlmConfig;
use crate::errors::{ConsultError, ConsultResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Common trait for all generative text providers
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Generate the full completion for a prompt
    async fn generate(&self, prompt: &str) -> ConsultResult<String>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;

    /// Get the model name being used
    fn model_name(&self) -> String;
}

fn build_http_client(timeout_secs: u64) -> ConsultResult<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| ConsultError::ConfigError(format!("Failed to create HTTP client: {}", e)))
}

//------------------------------------------------------------------------------
// Gemini Client
//------------------------------------------------------------------------------

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const GEMINI_API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini API client (Google AI)
#[derive(Debug, Clone)]
pub struct GeminiClient {
    api_key: String,
    model_name: String,
    base_url: String,
    temperature: f32,
    max_output_tokens: u32,
    http_client: Client,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPart<'a>>,
    role: &'static str,
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiResponseContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Deserialize, Debug)]
struct GeminiResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

#[derive(Deserialize, Debug)]
struct GeminiErrorResponse {
    error: GeminiErrorBody,
}

#[derive(Deserialize, Debug)]
struct GeminiErrorBody {
    code: u32,
    message: String,
    #[serde(default)]
    status: String,
}

impl GeminiClient {
    /// Create a new Gemini client
    pub fn new(config: &LlmConfig) -> ConsultResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                ConsultError::ConfigError(
                    "API key is required to initialize the Gemini client".to_string(),
                )
            })?;

        Ok(Self {
            api_key,
            model_name: config.model_name.clone(),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| GEMINI_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            http_client: build_http_client(config.timeout_secs)?,
        })
    }

    /// Build the Gemini API URL for the configured model.
    ///
    /// The key travels in a header so it never shows up in a URL.
    fn api_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model_name)
    }
}

/// Pull the completion text out of a successful Gemini response body.
///
/// All text parts of the first candidate are concatenated; Gemini splits long
/// answers across parts.
fn extract_gemini_text(response_text: &str) -> ConsultResult<String> {
    let response: GeminiResponse = serde_json::from_str(response_text)
        .map_err(|e| ConsultError::ParsingError(format!("Failed to parse Gemini response: {}", e)))?;

    if let Some(usage) = &response.usage_metadata {
        debug!(
            prompt_tokens = usage.prompt_token_count,
            response_tokens = usage.candidates_token_count,
            total_tokens = usage.total_token_count,
            "Gemini token usage"
        );
    }

    let candidate = response
        .candidates
        .first()
        .ok_or_else(|| ConsultError::ResponseError("No candidates in response".to_string()))?;

    if let Some(reason) = &candidate.finish_reason {
        if reason != "STOP" {
            warn!(finish_reason = %reason, "Gemini generation did not finish normally");
        }
    }

    let text: String = candidate
        .content
        .iter()
        .flat_map(|content| content.parts.iter())
        .filter_map(|part| part.text.as_deref())
        .collect();

    if text.is_empty() {
        return Err(ConsultError::ResponseError(
            "No text generated by Gemini".to_string(),
        ));
    }
    Ok(text)
}

fn gemini_error(status: reqwest::StatusCode, response_text: &str) -> ConsultError {
    match serde_json::from_str::<GeminiErrorResponse>(response_text) {
        Ok(body) => ConsultError::ApiError(format!(
            "Gemini API error: {} (code: {}, status: {})",
            body.error.message, body.error.code, body.error.status
        )),
        Err(_) => ConsultError::HttpError {
            status_code: status.as_u16(),
            message: format!("Gemini API request failed: {}", response_text),
        },
    }
}

#[async_trait]
impl LLMClient for GeminiClient {
    fn provider_name(&self) -> &'static str {
        "gemini"
    }

    fn model_name(&self) -> String {
        self.model_name.clone()
    }

    async fn generate(&self, prompt: &str) -> ConsultResult<String> {
        debug!(model = %self.model_name, prompt_len = prompt.len(), "Generating text with Gemini");

        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: prompt }],
                role: "user",
            }],
            generation_config: GeminiGenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            },
        };

        let response = self
            .http_client
            .post(self.api_url())
            .header(GEMINI_API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                ConsultError::RequestError(format!(
                    "Failed to send request to Gemini API: {}",
                    e.without_url()
                ))
            })?;

        let status = response.status();
        let response_text = response.text().await.map_err(|e| {
            ConsultError::ResponseError(format!("Failed to read Gemini response: {}", e.without_url()))
        })?;

        if !status.is_success() {
            return Err(gemini_error(status, &response_text));
        }

        extract_gemini_text(&response_text)
    }
}

//------------------------------------------------------------------------------
// Ollama Client
//------------------------------------------------------------------------------

/// Ollama API client for self-hosted models
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
    model_name: String,
    temperature: f32,
    max_output_tokens: u32,
    http_client: Client,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize, Debug)]
struct OllamaResponse {
    response: String,
    #[serde(default)]
    total_duration: Option<u64>,
    #[serde(default)]
    eval_count: Option<u32>,
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(config: &LlmConfig) -> ConsultResult<Self> {
        let base_url = config
            .base_url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| ConsultError::ConfigError("Base URL is required for Ollama".to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model_name: config.model_name.clone(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            http_client: build_http_client(config.timeout_secs)?,
        })
    }

    fn api_url(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }
}

#[async_trait]
impl LLMClient for OllamaClient {
    fn provider_name(&self) -> &'static str {
        "ollama"
    }

    fn model_name(&self) -> String {
        self.model_name.clone()
    }

    async fn generate(&self, prompt: &str) -> ConsultResult<String> {
        debug!(model = %self.model_name, "Generating text with Ollama");

        let request = OllamaRequest {
            model: &self.model_name,
            prompt,
            stream: false,
            options: OllamaOptions {
                temperature: self.temperature,
                num_predict: self.max_output_tokens,
            },
        };

        let response = self
            .http_client
            .post(self.api_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| ConsultError::RequestError(format!("Failed to send request to Ollama API: {}", e)))?;

        let status = response.status();
        let response_text = response.text().await.map_err(|e| {
            ConsultError::ResponseError(format!("Failed to read Ollama response: {}", e))
        })?;

        if !status.is_success() {
            return Err(ConsultError::HttpError {
                status_code: status.as_u16(),
                message: format!("Ollama API request failed: {}", response_text),
            });
        }

        let ollama_response: OllamaResponse = serde_json::from_str(&response_text)
            .map_err(|e| ConsultError::ParsingError(format!("Failed to parse Ollama response: {}", e)))?;

        if let (Some(total), Some(eval_count)) =
            (ollama_response.total_duration, ollama_response.eval_count)
        {
            debug!(total_duration = total, eval_tokens = eval_count, "Ollama performance");
        }

        if ollama_response.response.is_empty() {
            return Err(ConsultError::ResponseError(
                "Ollama returned empty response".to_string(),
            ));
        }

        Ok(ollama_response.response)
    }
}

/// Build the configured generative text client.
///
/// Generation is mandatory for the service, so an unknown provider is an error
/// rather than `None`.
pub fn create_llm_client(config: &LlmConfig) -> ConsultResult<Arc<dyn LLMClient>> {
    match config.provider.as_str() {
        "gemini" => {
            info!(model = %config.model_name, "Creating Gemini LLM client");
            Ok(Arc::new(GeminiClient::new(config)?))
        }
        "ollama" => {
            info!(model = %config.model_name, "Creating Ollama LLM client");
            Ok(Arc::new(OllamaClient::new(config)?))
        }
        other => Err(ConsultError::ConfigError(format!(
            "Unsupported LLM provider '{}'",
            other
        ))),
    }
}
