//! Artist suggestions from a language model.

use super::provider::{CompletionOptions, LlmError, LlmProvider};
use super::types::Message;
use crate::recommend::{SeedContext, Suggestion, SuggestionError, SuggestionService};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, warn};

const SYSTEM_PROMPT: &str = "You are a music recommendation assistant. \
You suggest real, existing recording artists that a listener is likely to enjoy \
but does not know yet. Never suggest an artist from the listener's known list. \
Reply with a JSON array only, no commentary. Each element is an object \
{\"name\": \"<artist name>\", \"genre\": \"<short genre>\"}.";

pub struct LlmSuggestionService {
    provider: Arc<dyn LlmProvider>,
    options: CompletionOptions,
}

impl LlmSuggestionService {
    pub fn new(provider: Arc<dyn LlmProvider>, options: CompletionOptions) -> Self {
        Self { provider, options }
    }
}

fn user_prompt(context: &SeedContext, genre_hint: Option<&str>) -> String {
    let mut prompt = String::new();

    let _ = writeln!(prompt, "Tracks from the listener's playlist:");
    for seed in &context.seeds {
        let _ = writeln!(prompt, "- {} - {}", seed.artist, seed.track);
    }

    if !context.known_artists.is_empty() {
        let _ = writeln!(
            prompt,
            "\nArtists the listener already knows: {}",
            context.known_artists.join(", ")
        );
    }

    if let Some(genre) = genre_hint {
        let _ = writeln!(prompt, "\nOnly suggest artists in this genre: {}", genre);
    }

    let _ = write!(
        prompt,
        "\nSuggest {} artists, best match first.",
        context.wanted
    );
    prompt
}

/// Spans of every balanced `[...]` starting at each `[`, in order of start.
fn bracketed_spans(text: &str) -> impl Iterator<Item = &str> {
    text.char_indices()
        .filter(|(_, c)| *c == '[')
        .filter_map(move |(start, _)| {
            let mut depth = 0usize;
            let mut in_string = false;
            let mut escaped = false;
            for (offset, c) in text[start..].char_indices() {
                if in_string {
                    match c {
                        _ if escaped => escaped = false,
                        '\\' => escaped = true,
                        '"' => in_string = false,
                        _ => {}
                    }
                    continue;
                }
                match c {
                    '"' => in_string = true,
                    '[' => depth += 1,
                    ']' => {
                        depth -= 1;
                        if depth == 0 {
                            return Some(&text[start..start + offset + 1]);
                        }
                    }
                    _ => {}
                }
            }
            None
        })
}

/// First JSON array in a model reply, tolerating code fences and prose.
fn extract_json_array(text: &str) -> Option<Vec<Value>> {
    bracketed_spans(text).find_map(|span| serde_json::from_str::<Vec<Value>>(span).ok())
}

/// Complete leading elements of an array the reply stopped in the middle of.
///
/// Cut points are the ends of top-level elements; the longest prefix that
/// parses once closed with `]` wins.
fn leading_complete_elements(text: &str) -> Option<Vec<Value>> {
    let start = text.find('[')?;
    let mut cuts = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, c) in text[start..].char_indices() {
        let end = start + offset + c.len_utf8();
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => {
                    in_string = false;
                    if depth == 1 {
                        cuts.push(end);
                    }
                }
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' | '{' => depth += 1,
            ']' | '}' => {
                depth = depth.saturating_sub(1);
                if depth == 1 {
                    cuts.push(end);
                }
            }
            _ => {}
        }
    }

    cuts.iter().rev().find_map(|&cut| {
        serde_json::from_str::<Vec<Value>>(&format!("{}]", &text[start..cut])).ok()
    })
}

fn to_suggestion(entry: &Value) -> Option<Suggestion> {
    match entry {
        Value::String(name) => Some(Suggestion {
            name: name.clone(),
            genre: None,
        }),
        Value::Object(fields) => {
            let name = fields
                .get("name")
                .or_else(|| fields.get("artist"))
                .and_then(Value::as_str)?;
            Some(Suggestion {
                name: name.to_string(),
                genre: fields.get("genre").and_then(Value::as_str).map(str::to_string),
            })
        }
        _ => None,
    }
}

/// Parse a model reply into raw suggestions.
///
/// A reply that was `truncated` by the provider keeps whatever entries
/// arrived complete.
fn parse_suggestions(reply: &str, truncated: bool) -> Result<Vec<Suggestion>, SuggestionError> {
    let entries = match extract_json_array(reply) {
        Some(entries) => entries,
        None if truncated => {
            let entries = leading_complete_elements(reply).ok_or_else(|| {
                SuggestionError::MalformedResponse(
                    "reply was cut short before any complete entry".to_string(),
                )
            })?;
            warn!(
                kept = entries.len(),
                "Suggestion reply was cut short, keeping the complete entries"
            );
            entries
        }
        None => {
            return Err(SuggestionError::MalformedResponse(
                "reply contains no JSON array".to_string(),
            ))
        }
    };
    Ok(entries.iter().filter_map(to_suggestion).collect())
}

impl From<LlmError> for SuggestionError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::Timeout => SuggestionError::Timeout,
            LlmError::InvalidResponse(msg) => SuggestionError::MalformedResponse(msg),
            other => SuggestionError::Unavailable(other.to_string()),
        }
    }
}

#[async_trait]
impl SuggestionService for LlmSuggestionService {
    async fn suggest(
        &self,
        context: &SeedContext,
        genre_hint: Option<&str>,
    ) -> Result<Vec<Suggestion>, SuggestionError> {
        let messages = [
            Message::system(SYSTEM_PROMPT),
            Message::user(user_prompt(context, genre_hint)),
        ];

        debug!(
            provider = self.provider.name(),
            model = self.provider.model(),
            seeds = context.seeds.len(),
            wanted = context.wanted,
            "Requesting artist suggestions"
        );

        let completion = self
            .provider
            .complete(&messages, &self.options)
            .await
            .inspect_err(|e| warn!("Suggestion request failed: {}", e))?;

        let truncated = completion.is_truncated();
        if truncated {
            debug!(finish_reason = ?completion.finish_reason, "Suggestion reply incomplete");
        }
        if let Some(usage) = completion.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Suggestion token usage"
            );
        }

        parse_suggestions(&completion.message.content, truncated)
    }
}
