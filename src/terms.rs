use crate::capability::TextGenerate;
use crate::retry::RetryPolicy;
use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use regex::Regex;
use tracing::{info, warn};

fn bracket_regex() -> Result<&'static Regex> {
    static BRACKET_RE: OnceCell<Regex> = OnceCell::new();
    BRACKET_RE
        .get_or_try_init(|| Regex::new(r"(?s)\[.*?\]"))
        .context("failed to compile bracket regex")
}

fn build_prompt(subject: &str, script: &str, amount: usize) -> String {
    format!(
        "# Role: video search term generator\n\
## Goal:\n\
Generate {amount} search terms related to '{subject}'.\n\
Return a JSON array of strings and nothing else, e.g. [\"term one\", \"term two\"].\n\
Each term is 1-3 words and must relate to the subject. Terms are in English.\n\
Script: {script}\n\
Respond with the JSON array only. No extra text."
    )
}

/// A parsed list is valid when every element is a string. Arity is not
/// strictly enforced.
fn parse_term_list(text: &str) -> Option<Vec<String>> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    let items = value.as_array()?;
    items
        .iter()
        .map(|item| item.as_str().map(str::to_string))
        .collect()
}

/// Best-effort repair: re-parse the first bracketed substring of a
/// free-text response.
fn extract_bracketed_list(text: &str) -> Option<Vec<String>> {
    let re = bracket_regex().ok()?;
    let candidate = re.find(text)?;
    parse_term_list(candidate.as_str())
}

/// Deterministic fallback used when every attempt fails.
fn fallback_terms(subject: &str, amount: usize) -> Vec<String> {
    (1..=amount).map(|i| format!("{subject} {i}")).collect()
}

/// Derive short search terms from the subject and script. Never fails:
/// exhausting retries degrades to the deterministic fallback list.
pub async fn generate(
    text: &dyn TextGenerate,
    policy: &RetryPolicy,
    subject: &str,
    script: &str,
    amount: usize,
) -> Vec<String> {
    let prompt = build_prompt(subject, script, amount);

    for attempt in 1..=policy.max_attempts() {
        match text.generate(&prompt).await {
            Ok(response) => {
                if let Some(terms) = parse_term_list(&response) {
                    info!(count = terms.len(), "search terms generated");
                    return terms;
                }
                if let Some(terms) = extract_bracketed_list(&response) {
                    warn!(
                        count = terms.len(),
                        "search terms recovered from free-text response"
                    );
                    return terms;
                }
                warn!(
                    "term response was not a JSON string array ({attempt}/{})",
                    policy.max_attempts()
                );
            }
            Err(err) => {
                warn!(
                    "term generation failed: {err} ({attempt}/{})",
                    policy.max_attempts()
                );
            }
        }

        if attempt < policy.max_attempts() {
            policy.pause().await;
        }
    }

    let terms = fallback_terms(subject, amount);
    warn!("falling back to deterministic terms: {terms:?}");
    terms
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::GenerationError;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedText {
        responses: Mutex<VecDeque<Result<String, GenerationError>>>,
    }

    impl ScriptedText {
        fn new(responses: Vec<Result<String, GenerationError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
            }
        }
    }

    #[async_trait]
    impl TextGenerate for ScriptedText {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(GenerationError::EmptyResponse))
        }
    }

    #[tokio::test]
    async fn strict_json_is_accepted() {
        let text = ScriptedText::new(vec![Ok(
            r#"["bitcoin price", "crypto market", "bitcoin chart"]"#.to_string()
        )]);
        let terms = generate(&text, &RetryPolicy::immediate(5), "bitcoin", "script", 3).await;
        assert_eq!(terms, vec!["bitcoin price", "crypto market", "bitcoin chart"]);
    }

    #[tokio::test]
    async fn bracketed_array_is_recovered_from_prose() {
        let text = ScriptedText::new(vec![Ok(
            "Here are your terms: [\"bitcoin etf\", \"trading floor\"] hope it helps".to_string(),
        )]);
        let terms = generate(&text, &RetryPolicy::immediate(5), "bitcoin", "script", 2).await;
        assert_eq!(terms, vec!["bitcoin etf", "trading floor"]);
    }

    #[tokio::test]
    async fn wrong_arity_is_still_accepted() {
        let text = ScriptedText::new(vec![Ok(r#"["only one"]"#.to_string())]);
        let terms = generate(&text, &RetryPolicy::immediate(5), "bitcoin", "script", 5).await;
        assert_eq!(terms, vec!["only one"]);
    }

    #[tokio::test]
    async fn non_string_elements_are_rejected_then_fall_back() {
        let text = ScriptedText::new(vec![
            Ok(r#"["term", 42]"#.to_string()),
            Ok("not json at all".to_string()),
            Ok("{}".to_string()),
        ]);
        let terms = generate(&text, &RetryPolicy::immediate(3), "bitcoin", "script", 2).await;
        assert_eq!(terms, vec!["bitcoin 1", "bitcoin 2"]);
    }

    #[tokio::test]
    async fn permanent_failure_yields_exact_fallback() {
        for amount in [1usize, 5, 50] {
            let text = ScriptedText::new(vec![]);
            let terms =
                generate(&text, &RetryPolicy::immediate(2), "ethereum", "script", amount).await;
            assert_eq!(terms.len(), amount);
            for (i, term) in terms.iter().enumerate() {
                assert_eq!(term, &format!("ethereum {}", i + 1));
            }
        }
    }
}
