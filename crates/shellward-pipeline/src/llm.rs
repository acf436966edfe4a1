//! HTTP collaborator client for OpenAI-compatible chat-completions APIs.
//!
//! Implements both [`Translator`] and [`Fixer`] over one endpoint. The API
//! key is read exclusively from the environment, never from request
//! payloads, and is never logged. Models are instructed to answer with a
//! strict JSON object `{"command": ..., "explanation": ...}`; replies are
//! parsed tolerantly (code fences stripped, outermost braces extracted)
//! because models drift from the schema in practice.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use shellward_session::SessionSnapshot;

use crate::collaborator::{CollaboratorError, Fixer, Translation, Translator};

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "SHELLWARD_API_KEY";
/// Environment variable overriding the model name.
pub const MODEL_ENV: &str = "SHELLWARD_MODEL";
/// Environment variable overriding the endpoint base URL.
pub const BASE_URL_ENV: &str = "SHELLWARD_BASE_URL";

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Longest intent/stderr text forwarded to the model, in bytes.
const MAX_FORWARDED_TEXT: usize = 4_000;

/// Chat-completions client usable as both collaborators.
pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl ChatClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Build a client from the environment; `None` when no API key is set.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty())?;
        let model = std::env::var(MODEL_ENV).unwrap_or_else(|_| DEFAULT_MODEL.into());
        let base_url = std::env::var(BASE_URL_ENV).unwrap_or_else(|_| DEFAULT_BASE_URL.into());
        Some(Self::new(base_url, api_key, model))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// One chat-completion round trip returning the assistant text.
    async fn complete(&self, system: &str, user: &str) -> Result<String, CollaboratorError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = json!({
            "model": self.model,
            "temperature": 0,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        });

        debug!(model = %self.model, "calling chat completions");
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(CollaboratorError::Api(format!(
                "{status}: {}",
                truncate(&detail, 500)
            )));
        }

        let completion: ChatCompletion = resp.json().await?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| CollaboratorError::Malformed("no choices in completion".into()))
    }

    /// Parse a model reply into a candidate, `Ok(None)` when the model
    /// declined to produce a runnable command.
    fn parse_candidate(content: &str) -> Result<Option<Translation>, CollaboratorError> {
        let value = extract_json_object(content)
            .ok_or_else(|| CollaboratorError::Malformed(truncate(content, 200).into_owned()))?;
        let command = value
            .get("command")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string();
        let explanation = value
            .get("explanation")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string();
        if command.is_empty() {
            return Ok(None);
        }
        Ok(Some(Translation {
            command,
            explanation,
        }))
    }
}

/// Extract the first JSON object from model output, stripping markdown code
/// fences and leading prose.
fn extract_json_object(text: &str) -> Option<Value> {
    let mut body = text.trim();
    if let Some(stripped) = body.strip_prefix("```") {
        // Drop the fence line (possibly "```json") and the closing fence.
        body = stripped.split_once('\n').map(|(_, rest)| rest).unwrap_or("");
        if let Some(end) = body.rfind("```") {
            body = &body[..end];
        }
        body = body.trim();
    }
    if let Ok(v) = serde_json::from_str::<Value>(body) {
        if v.is_object() {
            return Some(v);
        }
    }
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&body[start..=end]).ok().filter(Value::is_object)
}

fn truncate(s: &str, max: usize) -> std::borrow::Cow<'_, str> {
    if s.len() <= max {
        s.into()
    } else {
        let cut = s
            .char_indices()
            .take_while(|(i, _)| *i < max)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        format!("{}...", &s[..cut]).into()
    }
}

fn context_block(ctx: &SessionSnapshot) -> String {
    let mut block = String::new();
    if let Some(cwd) = &ctx.cwd {
        block.push_str(&format!("Working directory: {cwd}\n"));
    }
    if !ctx.recent.is_empty() {
        block.push_str("Recent activity:\n");
        for line in &ctx.recent {
            block.push_str(line);
            block.push('\n');
        }
    }
    block
}

const TRANSLATE_SYSTEM: &str = "You are a Linux shell expert. Convert the user's natural-language \
request into a single POSIX-compatible command. Answer ONLY with JSON: \
{\"command\": string, \"explanation\": string}. No prose, no code fences. \
If no runnable command is appropriate, set \"command\" to an empty string \
and put your guidance in \"explanation\". A separate safety check will \
assess the command before it runs.";

const FIX_SYSTEM: &str = "You are a Linux CLI fixer. Given a command that failed and its error \
output, propose a corrected command. If the intent is ambiguous, choose the \
most likely correction. Answer ONLY with JSON: {\"command\": string, \
\"explanation\": string}. If the best action is to explain instead of \
running anything, set \"command\" to an empty string.";

#[async_trait]
impl Translator for ChatClient {
    async fn translate(
        &self,
        intent: &str,
        ctx: &SessionSnapshot,
    ) -> Result<Option<Translation>, CollaboratorError> {
        let user = format!(
            "{}Request: {}",
            context_block(ctx),
            truncate(intent, MAX_FORWARDED_TEXT)
        );
        let content = self.complete(TRANSLATE_SYSTEM, &user).await?;
        Self::parse_candidate(&content)
    }
}

#[async_trait]
impl Fixer for ChatClient {
    async fn suggest_fix(
        &self,
        command: &str,
        stderr_tail: &str,
        intent: Option<&str>,
        ctx: &SessionSnapshot,
    ) -> Result<Option<Translation>, CollaboratorError> {
        let mut user = context_block(ctx);
        if let Some(intent) = intent {
            user.push_str(&format!("Intent: {}\n", truncate(intent, MAX_FORWARDED_TEXT)));
        }
        user.push_str(&format!(
            "Command: {}\nError: {}\n",
            truncate(command, MAX_FORWARDED_TEXT),
            truncate(stderr_tail, MAX_FORWARDED_TEXT)
        ));
        let content = self.complete(FIX_SYSTEM, &user).await?;
        Self::parse_candidate(&content)
    }
}
