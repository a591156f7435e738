//! OpenAI chat-completions client with schema-constrained output
//!
//! Every call asks the model to answer with JSON matching a schema derived
//! from a Rust type (`PaperSummary`, `ConditionResult`). The response is parsed
//! into that type; a mismatch is a `ModelOutput` error and is never retried.
//! Transport failures (timeouts, 429, 5xx) are retried with backoff. Any other
//! 4xx means the key, model or schema is wrong and surfaces as a `Config` error,
//! except an input too long for the model, which only fails that paper.

use crate::error::{Error, Result};
use crate::settings::Settings;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Keywords the strict structured-output mode does not accept
const UNSUPPORTED_KEYWORDS: &[&str] = &["$schema", "format", "default"];

/// Upper bound for a single backoff sleep
const MAX_BACKOFF: Duration = Duration::from_secs(8);

/// One schema-constrained completion request
#[derive(Debug, Clone)]
pub struct StructuredRequest<'a> {
    pub system_prompt: &'a str,
    pub user_message: &'a str,
    pub schema_name: String,
    pub schema: Value,
}

/// A service that answers a structured request with raw JSON text
pub trait LlmClient {
    fn complete(&self, request: &StructuredRequest<'_>) -> Result<String>;
}

/// Ask the model for a `T` and parse its answer
pub fn complete_structured<T>(client: &dyn LlmClient, system_prompt: &str, user_message: &str) -> Result<T>
where
    T: DeserializeOwned + JsonSchema,
{
    let request = StructuredRequest {
        system_prompt,
        user_message,
        schema_name: T::schema_name().to_string(),
        schema: strict_schema::<T>(),
    };

    let text = client.complete(&request)?;

    serde_json::from_str(&text).map_err(|e| Error::ModelOutput {
        schema: request.schema_name.clone(),
        message: e.to_string(),
    })
}

/// JSON Schema for `T`, normalised for strict structured output:
/// every object lists all of its properties as required and allows no others.
pub fn strict_schema<T: JsonSchema>() -> Value {
    let mut schema = serde_json::to_value(schemars::schema_for!(T)).unwrap_or_default();
    make_strict(&mut schema);
    schema
}

fn make_strict(schema: &mut Value) {
    match schema {
        Value::Array(items) => items.iter_mut().for_each(make_strict),
        Value::Object(map) => {
            for keyword in UNSUPPORTED_KEYWORDS {
                map.remove(*keyword);
            }

            let required = match map.get_mut("properties") {
                Some(Value::Object(props)) => {
                    props.values_mut().for_each(make_strict);
                    Some(props.keys().cloned().map(Value::String).collect::<Vec<_>>())
                }
                _ => None,
            };
            if let Some(required) = required {
                map.insert("required".to_string(), Value::Array(required));
                map.insert("additionalProperties".to_string(), Value::Bool(false));
            }

            // Property and definition maps are keyed by name, not keyword
            if let Some(Value::Object(defs)) = map.get_mut("$defs") {
                defs.values_mut().for_each(make_strict);
            }
            for (key, value) in map.iter_mut() {
                if key != "properties" && key != "$defs" {
                    make_strict(value);
                }
            }
        }
        _ => {}
    }
}

/// Delay before retry number `attempt + 1`: 500ms doubling, capped
pub fn backoff_delay(attempt: u32) -> Duration {
    let millis = 500u64.saturating_mul(1u64 << attempt.min(16));
    Duration::from_millis(millis).min(MAX_BACKOFF)
}

// ==================== OpenAI wire format ====================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    response_format: ResponseFormat<'a>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: JsonSchemaFormat<'a>,
}

#[derive(Debug, Serialize)]
struct JsonSchemaFormat<'a> {
    name: &'a str,
    schema: &'a Value,
    strict: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

enum AttemptError {
    /// Network failure, 429 or 5xx
    Retryable(String),
    /// The service refused the request itself (bad key, bad schema, unknown model)
    Rejected(String),
    /// The input for this one paper was refused
    InputRejected(String),
    Fatal(String),
}

/// Sort a non-success HTTP status into a retry decision
fn classify_status(status: reqwest::StatusCode, body: &str) -> AttemptError {
    let message = format!("API error {}: {}", status, body);
    if status.as_u16() == 429 || status.is_server_error() {
        AttemptError::Retryable(message)
    } else if body.contains("context_length_exceeded") {
        AttemptError::InputRejected(message)
    } else if status.is_client_error() {
        AttemptError::Rejected(message)
    } else {
        AttemptError::Fatal(message)
    }
}

/// Blocking OpenAI client
pub struct OpenAiClient {
    http: reqwest::blocking::Client,
    api_base: String,
    api_key: String,
    model: String,
    max_retries: u32,
}

impl OpenAiClient {
    pub fn new(api_key: String, settings: &Settings) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .user_agent(concat!("litreview/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            api_key,
            model: settings.model.clone(),
            max_retries: settings.max_retries,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn send_once(&self, body: &ChatRequest<'_>) -> std::result::Result<ChatResponse, AttemptError> {
        let response = self
            .http
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .map_err(|e| AttemptError::Retryable(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(classify_status(status, &text));
        }

        response
            .json()
            .map_err(|e| AttemptError::Fatal(format!("Failed to parse response: {}", e)))
    }
}

impl LlmClient for OpenAiClient {
    fn complete(&self, request: &StructuredRequest<'_>) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                Message { role: "system", content: request.system_prompt },
                Message { role: "user", content: request.user_message },
            ],
            response_format: ResponseFormat {
                kind: "json_schema",
                json_schema: JsonSchemaFormat {
                    name: &request.schema_name,
                    schema: &request.schema,
                    strict: true,
                },
            },
        };

        let mut attempt = 0;
        let response = loop {
            match self.send_once(&body) {
                Ok(response) => break response,
                Err(AttemptError::Retryable(message)) if attempt < self.max_retries => {
                    let delay = backoff_delay(attempt);
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "{}; retrying",
                        message
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(AttemptError::Retryable(message)) | Err(AttemptError::Fatal(message)) => {
                    return Err(Error::Transport(message));
                }
                Err(AttemptError::Rejected(message)) => {
                    return Err(Error::Config(format!("{} rejected the request: {}", self.api_base, message)));
                }
                Err(AttemptError::InputRejected(message)) => {
                    return Err(Error::ModelOutput { schema: request.schema_name.clone(), message });
                }
            }
        };

        if let Some(usage) = &response.usage {
            tracing::debug!(
                model = %self.model,
                input_tokens = usage.prompt_tokens,
                output_tokens = usage.completion_tokens,
                "LLM usage"
            );
        }

        message_content(response, &request.schema_name)
    }
}

fn message_content(response: ChatResponse, schema_name: &str) -> Result<String> {
    let rejected = |message: String| Error::ModelOutput { schema: schema_name.to_string(), message };

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| rejected("response contained no choices".to_string()))?;

    if let Some(refusal) = choice.message.refusal {
        return Err(rejected(format!("model refused: {}", refusal)));
    }
    if choice.finish_reason.as_deref() == Some("length") {
        return Err(rejected("output truncated at token limit".to_string()));
    }

    choice
        .message
        .content
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| rejected("empty message content".to_string()))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::RefCell;

    /// A request as seen by [`ScriptedClient`]
    #[derive(Debug, Clone)]
    pub struct RecordedRequest {
        pub system_prompt: String,
        pub user_message: String,
        pub schema_name: String,
    }

    type Handler = Box<dyn Fn(&RecordedRequest) -> Result<String>>;

    /// In-process stand-in for the LLM: answers via a closure and records calls
    pub struct ScriptedClient {
        handler: Handler,
        requests: RefCell<Vec<RecordedRequest>>,
    }

    impl ScriptedClient {
        pub fn new(handler: impl Fn(&RecordedRequest) -> Result<String> + 'static) -> Self {
            Self { handler: Box::new(handler), requests: RefCell::new(Vec::new()) }
        }

        /// Answer every request with the same JSON value
        pub fn always(value: Value) -> Self {
            let text = value.to_string();
            Self::new(move |_| Ok(text.clone()))
        }

        pub fn calls(&self) -> usize {
            self.requests.borrow().len()
        }

        pub fn requests(&self) -> Vec<RecordedRequest> {
            self.requests.borrow().clone()
        }
    }

    impl LlmClient for ScriptedClient {
        fn complete(&self, request: &StructuredRequest<'_>) -> Result<String> {
            let recorded = RecordedRequest {
                system_prompt: request.system_prompt.to_string(),
                user_message: request.user_message.to_string(),
                schema_name: request.schema_name.clone(),
            };
            self.requests.borrow_mut().push(recorded.clone());
            (self.handler)(&recorded)
        }
    }
}
