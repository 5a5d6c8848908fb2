//! HTTP-backed model invoker for the supported providers.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::{json, Value};

use super::{ModelInvoker, ModelRequest};
use crate::config::{LlmConfig, LlmProvider};
use crate::error::{Error, ProviderError, Result};

const SYSTEM_PROMPT: &str = "You are a task-management assistant. Answer with strict JSON only, matching the requested schema. Do not wrap the JSON in prose.";

/// Model invoker talking to a hosted provider over HTTP.
pub struct HttpModelInvoker {
    model: String,
    provider: LlmProvider,
    endpoint: String,
    api_key: Option<String>,
    timeout: Duration,
    http: reqwest::Client,
}

impl HttpModelInvoker {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .unwrap_or_else(|| config.provider.default_endpoint().to_string())
            .trim_end_matches('/')
            .to_string();
        let api_key = config.api_key.clone().or_else(|| {
            config
                .provider
                .api_key_env()
                .and_then(|var| std::env::var(var).ok())
        });

        if let Some(var) = config.provider.api_key_env() {
            if api_key.is_none() {
                return Err(Error::Config(format!(
                    "llm.api_key (or {}) is required for provider {}",
                    var,
                    config.provider.as_str()
                )));
            }
        }

        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            model: config.model_name().to_string(),
            provider: config.provider,
            endpoint,
            api_key,
            timeout,
            http,
        })
    }

    fn transport_error(&self, provider: &str, e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout(self.timeout)
        } else {
            ProviderError::Network(format!("{provider} request failed: {e}"))
        }
    }

    fn api_key_header(&self, value: String) -> std::result::Result<HeaderValue, ProviderError> {
        HeaderValue::from_str(&value)
            .map_err(|e| ProviderError::Rejected(format!("invalid api key header: {e}")))
    }

    /// POST `body` and return the decoded JSON response, mapping failures.
    async fn post_json(
        &self,
        provider: &str,
        url: String,
        headers: HeaderMap,
        body: Value,
    ) -> std::result::Result<Value, ProviderError> {
        let resp = self
            .http
            .post(url)
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(provider, e))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| self.transport_error(provider, e))?;
        if !status.is_success() {
            return Err(ProviderError::Rejected(format!(
                "{} returned {}: {}",
                provider,
                status.as_u16(),
                text
            )));
        }
        serde_json::from_str(&text)
            .map_err(|e| ProviderError::Malformed(format!("{provider} body is not JSON: {e}")))
    }

    async fn invoke_gemini(
        &self,
        model: &str,
        request: ModelRequest<'_>,
    ) -> std::result::Result<String, ProviderError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint,
            urlencoding::encode(model)
        );
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-goog-api-key",
            self.api_key_header(self.api_key.clone().unwrap_or_default())?,
        );

        let mut generation = json!({
            "responseMimeType": "application/json",
            "responseSchema": gemini_schema(request.output_schema),
        });
        if let Some(t) = request.config.temperature {
            generation["temperature"] = json!(t);
        }
        let mut body = json!({
            "systemInstruction": { "parts": [{ "text": SYSTEM_PROMPT }] },
            "contents": [{ "role": "user", "parts": [{ "text": request.prompt }] }],
            "generationConfig": generation,
        });
        if !request.config.safety_settings.is_empty() {
            body["safetySettings"] = json!(request.config.safety_settings);
        }

        let json = self.post_json("gemini", url, headers, body).await?;
        gemini_text(&json)
    }

    async fn invoke_ollama(
        &self,
        model: &str,
        request: ModelRequest<'_>,
    ) -> std::result::Result<String, ProviderError> {
        let url = format!("{}/api/generate", self.endpoint);
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut body = json!({
            "model": model,
            "system": SYSTEM_PROMPT,
            "prompt": request.prompt,
            "format": request.output_schema,
            "stream": false,
        });
        if let Some(t) = request.config.temperature {
            body["options"] = json!({ "temperature": t });
        }

        let json = self.post_json("ollama", url, headers, body).await?;
        json.get("response")
            .and_then(|v| v.as_str())
            .map(ToString::to_string)
            .ok_or_else(|| {
                ProviderError::Malformed("ollama response missing string field `response`".to_string())
            })
    }

    async fn invoke_claude(
        &self,
        model: &str,
        request: ModelRequest<'_>,
    ) -> std::result::Result<String, ProviderError> {
        let url = format!("{}/v1/messages", self.endpoint);
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-api-key",
            self.api_key_header(self.api_key.clone().unwrap_or_default())?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static("2023-06-01"));

        let system = format!(
            "{SYSTEM_PROMPT}\nThe JSON must satisfy this JSON Schema:\n{}",
            request.output_schema
        );
        let body = json!({
            "model": model,
            "max_tokens": 1024,
            "temperature": request.config.temperature.unwrap_or(0.0),
            "system": system,
            "messages": [{ "role": "user", "content": request.prompt }],
        });

        let json = self.post_json("claude", url, headers, body).await?;
        json.get("content")
            .and_then(|v| v.as_array())
            .and_then(|arr| arr.first())
            .and_then(|v| v.get("text"))
            .and_then(|v| v.as_str())
            .map(ToString::to_string)
            .ok_or_else(|| ProviderError::Malformed("claude response missing content[0].text".to_string()))
    }

    async fn invoke_openai(
        &self,
        model: &str,
        request: ModelRequest<'_>,
    ) -> std::result::Result<String, ProviderError> {
        let url = format!("{}/v1/chat/completions", self.endpoint);
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            self.api_key_header(format!(
                "Bearer {}",
                self.api_key.as_deref().unwrap_or_default()
            ))?,
        );

        let body = json!({
            "model": model,
            "temperature": request.config.temperature.unwrap_or(0.0),
            "response_format": {
                "type": "json_schema",
                "json_schema": { "name": request.flow, "schema": request.output_schema },
            },
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": request.prompt }
            ]
        });

        let json = self.post_json("openai", url, headers, body).await?;
        json.get("choices")
            .and_then(|v| v.as_array())
            .and_then(|arr| arr.first())
            .and_then(|v| v.get("message"))
            .and_then(|v| v.get("content"))
            .and_then(|v| v.as_str())
            .map(ToString::to_string)
            .ok_or_else(|| {
                ProviderError::Malformed("openai response missing choices[0].message.content".to_string())
            })
    }
}

#[async_trait]
impl ModelInvoker for HttpModelInvoker {
    async fn invoke(&self, request: ModelRequest<'_>) -> std::result::Result<String, ProviderError> {
        let model = request.config.model.as_deref().unwrap_or(&self.model);
        tracing::debug!(
            flow = request.flow,
            provider = self.provider.as_str(),
            model,
            "Calling model provider"
        );

        if self.provider != LlmProvider::Gemini && !request.config.safety_settings.is_empty() {
            tracing::debug!(
                flow = request.flow,
                provider = self.provider.as_str(),
                "Safety settings are only honoured by gemini; ignoring"
            );
        }

        match self.provider {
            LlmProvider::Gemini => self.invoke_gemini(model, request).await,
            LlmProvider::Ollama => self.invoke_ollama(model, request).await,
            LlmProvider::Claude => self.invoke_claude(model, request).await,
            LlmProvider::OpenAI => self.invoke_openai(model, request).await,
        }
    }
}

/// Extract generated text from a `generateContent` response.
///
/// A prompt-level block or a candidate stopped for safety is a rejection.
fn gemini_text(json: &Value) -> std::result::Result<String, ProviderError> {
    if let Some(reason) = json
        .get("promptFeedback")
        .and_then(|f| f.get("blockReason"))
        .and_then(|r| r.as_str())
    {
        return Err(ProviderError::Rejected(format!("prompt blocked: {reason}")));
    }

    let candidate = json
        .get("candidates")
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .ok_or_else(|| ProviderError::Malformed("gemini response has no candidates".to_string()))?;

    if let Some(reason @ ("SAFETY" | "BLOCKLIST" | "PROHIBITED_CONTENT")) =
        candidate.get("finishReason").and_then(|r| r.as_str())
    {
        return Err(ProviderError::Rejected(format!("response blocked: {reason}")));
    }

    let text: String = candidate
        .get("content")
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                .collect()
        })
        .unwrap_or_default();

    if text.is_empty() {
        return Err(ProviderError::Malformed(
            "gemini response missing candidates[0].content.parts[].text".to_string(),
        ));
    }
    Ok(text)
}

/// Reduce JSON Schema to the OpenAPI subset accepted as `responseSchema`.
fn gemini_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (key, value) in map {
                match key.as_str() {
                    "additionalProperties" | "minimum" | "maximum" => {}
                    "type" => {
                        let upper = value.as_str().map(str::to_uppercase).unwrap_or_default();
                        out.insert(key.clone(), json!(upper));
                    }
                    "properties" => {
                        let props = value
                            .as_object()
                            .map(|p| {
                                p.iter()
                                    .map(|(name, s)| (name.clone(), gemini_schema(s)))
                                    .collect::<serde_json::Map<_, _>>()
                            })
                            .unwrap_or_default();
                        out.insert(key.clone(), Value::Object(props));
                    }
                    "items" => {
                        out.insert(key.clone(), gemini_schema(value));
                    }
                    _ => {
                        out.insert(key.clone(), value.clone());
                    }
                }
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_api_key_for_hosted_providers() {
        let config = LlmConfig {
            provider: LlmProvider::Claude,
            api_key: None,
            ..Default::default()
        };
        if std::env::var("ANTHROPIC_API_KEY").is_err() {
            assert!(HttpModelInvoker::new(&config).is_err());
        }

        let config = LlmConfig {
            provider: LlmProvider::Ollama,
            ..Default::default()
        };
        assert!(HttpModelInvoker::new(&config).is_ok());
    }

    #[test]
    fn test_gemini_schema_subset() {
        let schema = json!({
            "type": "object",
            "properties": {
                "confidence": {"type": "number", "minimum": 0.0, "maximum": 1.0, "description": "c"},
                "tags": {"type": "array", "items": {"type": "string"}}
            },
            "required": ["confidence"],
            "additionalProperties": false
        });
        let reduced = gemini_schema(&schema);
        assert_eq!(reduced["type"], "OBJECT");
        assert!(reduced.get("additionalProperties").is_none());
        assert_eq!(reduced["properties"]["confidence"]["type"], "NUMBER");
        assert!(reduced["properties"]["confidence"].get("minimum").is_none());
        assert_eq!(reduced["properties"]["confidence"]["description"], "c");
        assert_eq!(reduced["properties"]["tags"]["items"]["type"], "STRING");
        assert_eq!(reduced["required"], json!(["confidence"]));
    }

    #[test]
    fn test_gemini_text_extraction() {
        let ok = json!({
            "candidates": [{
                "content": {"parts": [{"text": "{\"a\":"}, {"text": "1}"}]},
                "finishReason": "STOP"
            }]
        });
        assert_eq!(gemini_text(&ok).unwrap(), "{\"a\":1}");

        let blocked = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        assert!(matches!(gemini_text(&blocked), Err(ProviderError::Rejected(_))));

        let stopped = json!({"candidates": [{"finishReason": "SAFETY"}]});
        assert!(matches!(gemini_text(&stopped), Err(ProviderError::Rejected(_))));

        let empty = json!({"candidates": []});
        assert!(matches!(gemini_text(&empty), Err(ProviderError::Malformed(_))));
    }
}
