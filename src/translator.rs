use crate::config::Config;
use crate::error::{MissingSetting, TranslateError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on candidates shown in the window.
pub const MAX_CANDIDATES: usize = 5;

pub const TEMPERATURE: f32 = 0.7;

pub const SYSTEM_PROMPT: &str = "You are a professional translator. User will provide text. \
You must detect the language. If it is English, translate to Chinese. If it is Chinese, \
translate to English. Output only the translation results. Provide 3 different \
versions/styles of translation separated by newline. Do not include any numbering, \
explanations, or extra formatting.";

#[derive(Serialize, Debug)]
pub(crate) struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize, Debug)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    #[serde(default)]
    message: ChoiceMessage,
}

#[derive(Deserialize, Debug, Default)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

/// One translation job; lives only for the duration of a call.
#[derive(Debug, Clone, Copy)]
pub struct TranslationRequest<'a> {
    pub source_text: &'a str,
}

impl<'a> TranslationRequest<'a> {
    pub fn new(source_text: &'a str) -> Self {
        Self { source_text }
    }

    pub(crate) fn to_chat(self, model: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model,
            messages: vec![
                ChatMessage { role: "system", content: SYSTEM_PROMPT },
                ChatMessage { role: "user", content: self.source_text },
            ],
            temperature: TEMPERATURE,
        }
    }
}

/// Client for OpenAI-compatible chat-completion endpoints.
///
/// Holds nothing but the connection pool, so one instance can serve any
/// number of overlapping calls.
#[derive(Clone, Debug)]
pub struct Translator {
    client: reqwest::Client,
}

impl Translator {
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_timeout(REQUEST_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Translate `text` into display lines.
    ///
    /// Every failure comes back as a single `Error:`/settings line so the
    /// caller can render the result without branching.
    pub async fn translate(&self, text: &str, cfg: &Config) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        match self.try_translate(TranslationRequest::new(text), cfg).await {
            Ok(results) => {
                tracing::info!("Translation returned {} candidate(s)", results.len());
                results
            }
            Err(e) => {
                if e.is_local() {
                    tracing::info!("Translation skipped: {}", e);
                } else {
                    tracing::warn!("Translation failed: {}", e);
                }
                vec![e.to_string()]
            }
        }
    }

    pub async fn try_translate(
        &self,
        req: TranslationRequest<'_>,
        cfg: &Config,
    ) -> Result<Vec<String>, TranslateError> {
        if req.source_text.is_empty() {
            return Ok(Vec::new());
        }
        if cfg.api_key.is_empty() {
            return Err(TranslateError::ConfigurationMissing(MissingSetting::ApiKey));
        }
        if cfg.api_url.is_empty() {
            return Err(TranslateError::ConfigurationMissing(MissingSetting::ApiUrl));
        }

        tracing::debug!(
            "Sending {} chars to {} (model {})",
            req.source_text.chars().count(),
            cfg.api_url,
            cfg.model
        );
        let resp = self
            .client
            .post(&cfg.api_url)
            .bearer_auth(&cfg.api_key)
            .json(&req.to_chat(&cfg.model))
            .send()
            .await
            .map_err(TranslateError::Transport)?;

        let status = resp.status();
        let body = resp.text().await.map_err(TranslateError::ReadBody)?;
        if !status.is_success() {
            return Err(TranslateError::ProviderHttp {
                status: status.as_u16(),
                body,
            });
        }

        let content = parse_content(&body)?;
        tracing::debug!("Provider replied with {} chars", content.chars().count());
        let results = split_results(&content);
        if results.is_empty() {
            return Ok(vec![content]);
        }
        Ok(results)
    }
}

fn parse_content(body: &str) -> Result<String, TranslateError> {
    let parsed: ChatResponse = serde_json::from_str(body)?;
    if let Some(err) = parsed.error {
        tracing::debug!("Provider error type: {:?}", err.kind);
        return Err(TranslateError::ProviderReported(err.message));
    }
    parsed
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content.unwrap_or_default())
        .ok_or(TranslateError::EmptyResult)
}

/// Break a model reply into at most [`MAX_CANDIDATES`] clean lines.
pub fn split_results(content: &str) -> Vec<String> {
    content
        .replace("\r\n", "\n")
        .split('\n')
        .map(|line| strip_enumeration(line.trim()))
        .filter(|line| !line.is_empty())
        .take(MAX_CANDIDATES)
        .map(str::to_string)
        .collect()
}

/// Drop a leading `1.` / `2)` / `3:` / `4、` marker.
fn strip_enumeration(line: &str) -> &str {
    let mut chars = line.chars();
    match (chars.next(), chars.next()) {
        (Some('1'..='9'), Some('.' | ')' | ':' | '、')) => chars.as_str().trim(),
        _ => line,
    }
}
