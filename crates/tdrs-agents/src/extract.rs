use tdrs_models::signal::Signal;
use tracing::{debug, info, warn};

use crate::llm::ModelClient;
use crate::prompts;

/// Find the first well-formed JSON object in free-form model output.
///
/// Handles clean JSON, markdown-fenced blocks, and prefix/suffix prose.
pub fn first_json_object(text: &str) -> Option<String> {
    let trimmed = text.trim();

    if trimmed.starts_with('{') && serde_json::from_str::<serde_json::Value>(trimmed).is_ok() {
        return Some(trimmed.to_string());
    }

    if let Some(fenced) = fenced_block(trimmed) {
        if serde_json::from_str::<serde_json::Value>(&fenced).is_ok() {
            return Some(fenced);
        }
    }

    if let Some(balanced) = balanced_object(trimmed) {
        if serde_json::from_str::<serde_json::Value>(&balanced).is_ok() {
            return Some(balanced);
        }
    }

    None
}

/// Extract the content of the first ```json / ``` fenced block.
fn fenced_block(text: &str) -> Option<String> {
    for marker in ["```json\n", "```json\r\n", "```\n", "```\r\n"] {
        if let Some(start) = text.find(marker) {
            let body_start = start + marker.len();
            if let Some(end) = text[body_start..].find("```") {
                return Some(text[body_start..body_start + end].trim().to_string());
            }
        }
    }
    None
}

/// Find the first balanced `{ ... }` span, respecting string literals.
fn balanced_object(text: &str) -> Option<String> {
    let mut depth = 0i32;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start {
                        return Some(text[s..=i].to_string());
                    }
                }
            }
            _ => {}
        }
    }
    None
}

/// Stage 1: look for an embedded decision object with a valid `action` field.
pub fn parse_structured_signal(text: &str) -> Option<Signal> {
    let json_str = first_json_object(text)?;
    let value: serde_json::Value = serde_json::from_str(&json_str).ok()?;
    value
        .get("action")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok())
}

/// Stage 3: whole-word scan for explicit label words.
///
/// Returns a signal only when exactly one distinct label appears; a text
/// mentioning both BUY and SELL is ambiguous and yields nothing.
pub fn keyword_signal(text: &str) -> Option<Signal> {
    let mut found: Option<Signal> = None;
    for word in text.split(|c: char| !c.is_alphanumeric()) {
        if let Ok(signal) = word.parse::<Signal>() {
            match found {
                None => found = Some(signal),
                Some(existing) if existing == signal => {}
                Some(_) => return None,
            }
        }
    }
    found
}

/// Convert arbitrary model text into a definite signal.
///
/// Fallback chain: structured parse, then a constrained model query, then
/// a keyword scan, then HOLD. Never fails; every default is logged with
/// the caller's context label.
pub async fn extract_signal(client: &ModelClient, text: &str, context_label: &str) -> Signal {
    if text.trim().is_empty() {
        info!(context = context_label, "Empty text; defaulting to HOLD");
        return Signal::Hold;
    }

    if let Some(signal) = parse_structured_signal(text) {
        debug!(context = context_label, signal = %signal, "Signal from structured parse");
        return signal;
    }

    match model_assisted(client, text).await {
        Ok(Some(signal)) => {
            debug!(context = context_label, signal = %signal, "Signal from model extraction");
            return signal;
        }
        Ok(None) => {
            debug!(
                context = context_label,
                "Model extraction returned no valid label"
            );
        }
        Err(e) => {
            warn!(context = context_label, error = %e, "Model extraction failed");
        }
    }

    if let Some(signal) = keyword_signal(text) {
        debug!(context = context_label, signal = %signal, "Signal from keyword scan");
        return signal;
    }

    info!(
        context = context_label,
        "No unambiguous signal in text; defaulting to HOLD"
    );
    Signal::Hold
}

/// Stage 2: one constrained invocation validated against the closed label set.
async fn model_assisted(
    client: &ModelClient,
    text: &str,
) -> Result<Option<Signal>, crate::error::LlmError> {
    let prompt = prompts::signal_extraction_prompt(text);
    let response = client.invoke(&prompt).await?;

    let token = response
        .split_whitespace()
        .next()
        .unwrap_or("")
        .trim_matches(|c: char| !c.is_alphanumeric());
    Ok(token.parse().ok())
}
