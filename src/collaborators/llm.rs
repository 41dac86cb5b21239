use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;

use super::{BatchProgress, RetranslatePair, Translator};
use crate::app_config::TranslationConfig;
use crate::errors::TranslateError;
use crate::language_utils;
use crate::subtitles::Segment;

// @module: LLM-backed subtitle translation over an OpenAI-compatible chat API

// @const: Numbered response line regex ("1. text", "2) text", "3．text")
static NUMBERED_LINE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d+)\s*[.):．]\s*(.+)$").expect("numbered line regex is valid")
});

/// Chat message in a request or response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender (system, user, assistant)
    pub role: String,
    /// Content of the message
    pub content: String,
}

/// Chat completion request body
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// One choice in a chat completion response
#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Chat completion response body
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

/// Translator backed by an OpenAI-compatible chat completions endpoint.
///
/// Entries are sent in numbered batches; a batch whose response does not
/// parse back to the exact input count is retried entry by entry before
/// the stage is failed.
#[derive(Debug)]
pub struct LlmTranslator {
    /// HTTP client for API requests
    client: Client,
    /// Service configuration
    config: TranslationConfig,
}

impl LlmTranslator {
    /// Create a translator client from the service configuration
    pub fn new(config: TranslationConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .unwrap_or_default(),
            config,
        }
    }

    fn api_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.endpoint.trim_end_matches('/')
        )
    }

    fn language_name(code: &str) -> String {
        language_utils::get_language_name(code).unwrap_or_else(|_| code.to_string())
    }

    fn system_prompt(source_lang: &str, target_lang: &str, context: Option<&str>) -> String {
        let mut prompt = format!(
            "You are a professional subtitle translator. Translate {} to {} naturally and fluently. \
             Keep the translation conversational and easy to understand. \
             You will receive numbered subtitle lines. \
             Return ONLY the numbered translations in the same format. \
             Do not add explanations, notes, or extra text.",
            Self::language_name(source_lang),
            Self::language_name(target_lang),
        );
        if let Some(context) = context {
            if !context.trim().is_empty() {
                prompt.push_str(&format!("\nAdditional guidance: {}", context.trim()));
            }
        }
        prompt
    }

    /// Complete one chat request and return the assistant text
    async fn complete(&self, system: &str, user: &str) -> Result<String, TranslateError> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            temperature: Some(self.config.temperature),
        };

        let response = self
            .client
            .post(self.api_url())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| TranslateError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            return Err(match status.as_u16() {
                401 | 403 => TranslateError::AuthenticationError(body),
                429 => TranslateError::QuotaExceeded(body),
                _ => TranslateError::RequestFailed(format!("{}: {}", status, body)),
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| TranslateError::MalformedResponse(e.to_string()))?;
        let text = parsed
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .unwrap_or_default();
        if text.is_empty() {
            return Err(TranslateError::MalformedResponse(
                "empty completion response".to_string(),
            ));
        }

        Ok(text)
    }

    /// Translate one batch with the numbered-lines protocol
    async fn translate_batch(
        &self,
        batch: &[Segment],
        source_lang: &str,
        target_lang: &str,
    ) -> Result<Vec<String>, TranslateError> {
        let numbered = batch
            .iter()
            .enumerate()
            .map(|(i, seg)| format!("{}. {}", i + 1, seg.text))
            .collect::<Vec<_>>()
            .join("\n");
        let user = format!(
            "Translate the following subtitle lines from {} to {}.\n\
             Return ONLY the numbered translations, one per line, \
             matching the input numbering exactly.\n\n{}",
            Self::language_name(source_lang),
            Self::language_name(target_lang),
            numbered
        );
        let system = Self::system_prompt(source_lang, target_lang, None);

        let response = self.complete(&system, &user).await?;
        parse_numbered_response(&response, batch.len())
    }

    /// Translate a batch entry by entry, used when batch parsing fails
    async fn translate_one_by_one(
        &self,
        batch: &[Segment],
        source_lang: &str,
        target_lang: &str,
    ) -> Result<Vec<String>, TranslateError> {
        let system = Self::system_prompt(source_lang, target_lang, None);
        let mut results = Vec::with_capacity(batch.len());
        for segment in batch {
            let user = format!(
                "Translate this subtitle text from {} to {}: {}",
                Self::language_name(source_lang),
                Self::language_name(target_lang),
                segment.text
            );
            let text = self.complete(&system, &user).await?;
            // Strip any numbering the model insisted on adding
            let renumbered = NUMBERED_LINE_REGEX
                .captures(&text)
                .and_then(|caps| caps.get(2))
                .map(|m| m.as_str().to_string());
            let text = renumbered.unwrap_or(text);
            if text.trim().is_empty() {
                return Err(TranslateError::MalformedResponse(format!(
                    "empty translation for entry {}",
                    segment.index
                )));
            }
            results.push(text.trim().to_string());
        }
        Ok(results)
    }
}

/// Parse a numbered batch response into translations in input order.
///
/// The count must match exactly; a missing or duplicated number means the
/// model dropped or merged lines and the batch cannot be trusted.
fn parse_numbered_response(
    response: &str,
    expected_count: usize,
) -> Result<Vec<String>, TranslateError> {
    let translations = parse_numbered_lines(response);

    if translations.len() != expected_count {
        return Err(TranslateError::MalformedResponse(format!(
            "expected {} translations, got {}",
            expected_count,
            translations.len()
        )));
    }

    let mut result = Vec::with_capacity(expected_count);
    for i in 1..=expected_count {
        match translations.get(&i) {
            Some(text) => result.push(text.clone()),
            None => {
                return Err(TranslateError::MalformedResponse(format!(
                    "missing translation for line {}",
                    i
                )));
            }
        }
    }

    Ok(result)
}

/// Collect `number -> text` pairs from a numbered response, leniently
fn parse_numbered_lines(response: &str) -> HashMap<usize, String> {
    let mut translations = HashMap::new();
    for line in response.trim().lines() {
        if let Some(caps) = NUMBERED_LINE_REGEX.captures(line) {
            let num: usize = caps
                .get(1)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(0);
            if num > 0 {
                if let Some(text) = caps.get(2) {
                    translations.insert(num, text.as_str().trim().to_string());
                }
            }
        }
    }
    translations
}

#[async_trait]
impl Translator for LlmTranslator {
    async fn translate_segments(
        &self,
        segments: &[Segment],
        source_lang: &str,
        target_lang: &str,
        on_progress: BatchProgress<'_>,
    ) -> Result<Vec<String>, TranslateError> {
        if segments.is_empty() {
            return Ok(Vec::new());
        }

        let batches: Vec<&[Segment]> = segments.chunks(self.config.batch_size.max(1)).collect();
        let total_entries = segments.len();
        let total_batches = batches.len();
        let semaphore = Arc::new(Semaphore::new(self.config.concurrent_requests.max(1)));
        let completed_entries = Arc::new(AtomicUsize::new(0));

        let batch_futures = batches
            .into_iter()
            .enumerate()
            .map(|(batch_index, batch)| {
                let semaphore = semaphore.clone();
                let completed_entries = completed_entries.clone();
                async move {
                    let _permit = semaphore.acquire().await.expect("semaphore never closed");

                    let result = match self.translate_batch(batch, source_lang, target_lang).await
                    {
                        Ok(texts) => Ok(texts),
                        Err(TranslateError::MalformedResponse(reason)) => {
                            warn!(
                                "Batch {} response malformed ({}), falling back to one-by-one",
                                batch_index + 1,
                                reason
                            );
                            self.translate_one_by_one(batch, source_lang, target_lang).await
                        }
                        Err(other) => Err(other),
                    };

                    if let Ok(texts) = &result {
                        let done = completed_entries.fetch_add(texts.len(), Ordering::SeqCst)
                            + texts.len();
                        on_progress(done, total_entries);
                        debug!("Batch {} of {} translated", batch_index + 1, total_batches);
                    }

                    (batch_index, result)
                }
            })
            .collect::<Vec<_>>();

        let results = stream::iter(batch_futures)
            .buffer_unordered(self.config.concurrent_requests.max(1))
            .collect::<Vec<_>>()
            .await;

        // Reassemble in input order regardless of completion order
        let mut ordered: Vec<Option<Vec<String>>> = vec![None; total_batches];
        for (batch_index, result) in results {
            ordered[batch_index] = Some(result?);
        }

        Ok(ordered.into_iter().flatten().flatten().collect())
    }

    async fn retranslate(
        &self,
        pairs: &[RetranslatePair],
        context: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<Vec<(usize, String)>, TranslateError> {
        if pairs.is_empty() {
            return Ok(Vec::new());
        }

        let numbered = pairs
            .iter()
            .enumerate()
            .map(|(i, pair)| format!("{}. {}", i + 1, pair.original_text))
            .collect::<Vec<_>>()
            .join("\n");
        let user = format!(
            "Provide an alternative translation for the following subtitle lines \
             from {} to {}.\n\
             Return ONLY the numbered translations, one per line, \
             matching the input numbering exactly.\n\n{}",
            Self::language_name(source_lang),
            Self::language_name(target_lang),
            numbered
        );
        let system = Self::system_prompt(source_lang, target_lang, Some(context));

        let response = self.complete(&system, &user).await?;
        let parsed = parse_numbered_lines(&response);
        if parsed.is_empty() {
            return Err(TranslateError::MalformedResponse(
                "no numbered lines in retranslation response".to_string(),
            ));
        }

        // Keep only positions that produced a result, mapped back to the
        // caller's entry indices
        let mut results = Vec::with_capacity(pairs.len());
        for (i, pair) in pairs.iter().enumerate() {
            if let Some(text) = parsed.get(&(i + 1)) {
                if !text.is_empty() {
                    results.push((pair.index, text.clone()));
                }
            }
        }

        Ok(results)
    }
}
