use crate::capability::TextGenerate;
use crate::content::SourceItem;
use crate::retry::RetryPolicy;
use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use regex::Regex;
use tracing::{info, warn};

// Spoken-rate heuristic bracketing the target duration.
const MIN_CHARS_PER_SECOND: u32 = 7;
const MAX_CHARS_PER_SECOND: u32 = 14;

/// Acceptable character-count window for a script of the given spoken
/// duration.
pub fn char_window(target_seconds: u32) -> (usize, usize) {
    (
        (target_seconds * MIN_CHARS_PER_SECOND) as usize,
        (target_seconds * MAX_CHARS_PER_SECOND) as usize,
    )
}

fn whitespace_regex() -> Result<&'static Regex> {
    static WS_RE: OnceCell<Regex> = OnceCell::new();
    WS_RE
        .get_or_try_init(|| Regex::new(r"\s+"))
        .context("failed to compile whitespace regex")
}

/// Collapse all whitespace runs to single spaces and trim.
pub fn collapse_whitespace(text: &str) -> String {
    match whitespace_regex() {
        Ok(re) => re.replace_all(text.trim(), " ").into_owned(),
        Err(_) => text.split_whitespace().collect::<Vec<_>>().join(" "),
    }
}

fn build_prompt(
    subject: &str,
    source: &SourceItem,
    market_line: &str,
    target_seconds: u32,
    min_chars: usize,
    max_chars: usize,
) -> String {
    let grounding = if source.is_grounded() {
        format!(
            "[title] {}\n[article material] {}\n[source] {}",
            source.title, source.body, source.url
        )
    } else {
        format!(
            "[title] {subject}\n[article material] (no article available; rely on general knowledge of the subject and keep claims conservative)"
        )
    };
    let reference = if market_line.is_empty() {
        String::new()
    } else {
        format!("\n[reference data] {market_line}")
    };

    format!(
        "You are a market news analyst. Using the article material and \
reference data below, write a calm spoken narration covering this single \
news item about {subject}.\n\
Structure the flow as: hook, context if needed, the core facts with their \
numbers, what it means for the market, risks to keep in mind, and one or \
two closing points to watch.\n\
Rules:\n\
- One natural spoken-flow narrative. No headings, no lists, no markup, no \
bracketed asides.\n\
- Keep figures from the material; hedge anything uncertain as an estimate \
or possibility.\n\
- No hype and no investment advice.\n\
- Length target: about {target_seconds} seconds of speech, {min_chars} to \
{max_chars} characters.\n\
- Output the narration body only.\n\n\
{grounding}{reference}"
    )
}

/// Generate the narration script. Length is a soft, retried constraint:
/// out-of-window attempts are retried and the last produced text is
/// accepted once attempts run out. Only a run where no attempt produced any
/// text is a hard failure.
pub async fn generate(
    text: &dyn TextGenerate,
    policy: &RetryPolicy,
    subject: &str,
    source: &SourceItem,
    market_line: &str,
    target_seconds: u32,
) -> Result<String> {
    let (min_chars, max_chars) = char_window(target_seconds);
    let prompt = build_prompt(subject, source, market_line, target_seconds, min_chars, max_chars);

    info!(subject, "generating video script");

    let mut last_script = String::new();
    for attempt in 1..=policy.max_attempts() {
        match text.generate(&prompt).await {
            Ok(raw) if !raw.trim().is_empty() => {
                let script = collapse_whitespace(&raw);
                let length = script.chars().count();
                if (min_chars..=max_chars).contains(&length) {
                    info!(length, "script accepted");
                    return Ok(script);
                }
                warn!(
                    length,
                    min_chars,
                    max_chars,
                    "script length off, retrying ({attempt}/{})",
                    policy.max_attempts()
                );
                last_script = script;
            }
            Ok(_) => {
                warn!(
                    "script generation returned empty text ({attempt}/{})",
                    policy.max_attempts()
                );
            }
            Err(err) => {
                warn!(
                    "script generation failed: {err} ({attempt}/{})",
                    policy.max_attempts()
                );
            }
        }

        if attempt < policy.max_attempts() {
            policy.pause().await;
        }
    }

    if !last_script.is_empty() {
        warn!(
            length = last_script.chars().count(),
            "accepting out-of-window script after exhausting retries"
        );
        return Ok(last_script);
    }

    anyhow::bail!(
        "script generation produced no text after {} attempts",
        policy.max_attempts()
    )
}
