// src/provider/openai.rs — OpenAI Responses API provider

use async_trait::async_trait;

use super::{ModelProvider, ModelResponse, ResponseRequest};
use crate::infra::errors::PipelineError;

/// Wait reported when a 429 carries no usable `Retry-After`.
const DEFAULT_RETRY_AFTER_MS: u64 = 5000;

/// `Retry-After` in whole seconds, as milliseconds.
fn retry_after_ms(header: Option<&str>) -> u64 {
    header
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(DEFAULT_RETRY_AFTER_MS, |secs| secs.saturating_mul(1000))
}

pub struct OpenAIProvider {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
}

impl OpenAIProvider {
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn request_body(request: &ResponseRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "input": request.input,
        });

        if let Some(effort) = &request.reasoning_effort {
            body["reasoning"] = serde_json::json!({ "effort": effort });
        }
        if let Some(verbosity) = &request.verbosity {
            body["text"] = serde_json::json!({ "verbosity": verbosity });
        }
        if !request.tools.is_empty() {
            let tools: Vec<serde_json::Value> = request
                .tools
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "type": "function",
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    })
                })
                .collect();
            body["tools"] = serde_json::json!(tools);
        }
        if let Some(name) = &request.tool_choice {
            body["tool_choice"] = serde_json::json!({ "type": "function", "name": name });
        }
        body
    }
}

#[async_trait]
impl ModelProvider for OpenAIProvider {
    fn id(&self) -> &str {
        "openai"
    }

    async fn respond(&self, request: ResponseRequest) -> Result<ModelResponse, PipelineError> {
        let body = Self::request_body(&request);

        let response = self
            .client
            .post(format!("{}/responses", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::Provider {
                provider: "openai".into(),
                message: e.to_string(),
                retriable: e.is_timeout() || e.is_connect(),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let header = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok());
            return Err(PipelineError::RateLimited {
                provider: "openai".into(),
                retry_after_ms: retry_after_ms(header),
            });
        }

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(PipelineError::Provider {
                provider: "openai".into(),
                message: format!("HTTP {}: {}", status, error_body),
                retriable: status.is_server_error(),
            });
        }

        let raw: serde_json::Value =
            response.json().await.map_err(|e| PipelineError::Provider {
                provider: "openai".into(),
                message: format!("Failed to parse response: {}", e),
                retriable: false,
            })?;

        if raw["output"].as_array().map_or(true, |o| o.is_empty()) {
            return Err(PipelineError::EmptyResponse {
                provider: "openai".into(),
            });
        }

        Ok(ModelResponse::from_raw(raw))
    }
}
