// src/provider/mod.rs — External model capability layer

pub mod openai;
pub mod resolver;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::infra::errors::PipelineError;
use crate::usage::{extract_usage, UsageTokens};

/// A generative / structured-output capability. One blocking round trip per call.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    fn id(&self) -> &str;

    async fn respond(&self, request: ResponseRequest) -> Result<ModelResponse, PipelineError>;
}

#[derive(Debug, Clone, Default)]
pub struct ResponseRequest {
    pub model: String,
    pub input: String,
    pub reasoning_effort: Option<String>,
    pub verbosity: Option<String>,
    pub tools: Vec<ToolDef>,
    /// Force a call to this function name.
    pub tool_choice: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ModelResponse {
    pub output_text: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: UsageTokens,
    /// The full response body as returned, persisted verbatim.
    pub raw: Value,
}

impl ModelResponse {
    /// Build from a Responses API body.
    ///
    /// Tool call arguments are kept as the serialized text the service
    /// emitted, so downstream parsing can still see top-level key order.
    pub fn from_raw(raw: Value) -> Self {
        let mut text = String::new();
        let mut tool_calls = Vec::new();

        let direct = raw.get("output_text").and_then(Value::as_str);
        if let Some(t) = direct {
            text.push_str(t);
        }

        for item in raw["output"].as_array().into_iter().flatten() {
            match item["type"].as_str() {
                Some("message") if direct.is_none() => {
                    for part in item["content"].as_array().into_iter().flatten() {
                        if part["type"].as_str() == Some("output_text") {
                            if let Some(t) = part["text"].as_str() {
                                text.push_str(t);
                            }
                        }
                    }
                }
                Some("function_call") => {
                    if let Some(call) = ToolCall::from_item(item) {
                        tool_calls.push(call);
                    }
                }
                Some("tool_call") => {
                    if let Some(call) = ToolCall::from_item(&item["tool_call"]) {
                        tool_calls.push(call);
                    }
                }
                _ => {}
            }
        }

        Self {
            output_text: text,
            tool_calls,
            usage: extract_usage(&raw),
            raw,
        }
    }

    pub fn raw_json(&self) -> String {
        self.raw.to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Serialized JSON object, as emitted.
    pub arguments: String,
}

impl ToolCall {
    fn from_item(item: &Value) -> Option<Self> {
        let name = item["name"].as_str()?.to_string();
        let arguments = match &item["arguments"] {
            Value::String(s) => s.clone(),
            Value::Object(_) => item["arguments"].to_string(),
            _ => return None,
        };
        let id = item["call_id"]
            .as_str()
            .or_else(|| item["id"].as_str())
            .unwrap_or("")
            .to_string();
        Some(Self {
            id,
            name,
            arguments,
        })
    }
}
