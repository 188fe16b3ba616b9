use crate::capability::ContentProvider;
use crate::content::SourceItem;
use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use regex::Regex;
use reqwest::Client;
use std::time::Duration;

const DDG_HTML_BASE: &str = "https://html.duckduckgo.com/html/";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Safari/605.1.15";

/// General web search scraped from the DuckDuckGo HTML endpoint, top
/// relevance result only.
pub struct DdgSearchProvider {
    client: Client,
}

impl DdgSearchProvider {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn result_regex() -> Result<&'static Regex> {
    static RESULT_RE: OnceCell<Regex> = OnceCell::new();
    RESULT_RE.get_or_try_init(|| {
        Regex::new(r#"(?is)<a[^>]*class="result__a"[^>]*href="([^"]+)"[^>]*>(.*?)</a>"#)
            .context("failed to compile result regex")
    })
}

fn snippet_regex() -> Result<&'static Regex> {
    static SNIPPET_RE: OnceCell<Regex> = OnceCell::new();
    SNIPPET_RE.get_or_try_init(|| {
        Regex::new(r#"(?is)class="result__snippet"[^>]*>(.*?)</a>"#)
            .context("failed to compile snippet regex")
    })
}

fn tag_regex() -> Result<&'static Regex> {
    static TAG_RE: OnceCell<Regex> = OnceCell::new();
    TAG_RE
        .get_or_try_init(|| Regex::new(r"<[^>]+>"))
        .context("failed to compile tag regex")
}

fn strip_tags(html: &str) -> String {
    let text = match tag_regex() {
        Ok(re) => re.replace_all(html, "").into_owned(),
        Err(_) => html.to_string(),
    };
    text.replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&#x27;", "'")
        .replace("&quot;", "\"")
        .trim()
        .to_string()
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Ok(byte) = u8::from_str_radix(&input[i + 1..i + 3], 16) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// DDG links are redirect URLs carrying the target in the `uddg` query
/// parameter.
fn resolve_result_url(href: &str) -> String {
    if let Some(pos) = href.find("uddg=") {
        let encoded = &href[pos + 5..];
        let encoded = encoded.split('&').next().unwrap_or(encoded);
        return percent_decode(encoded);
    }
    href.to_string()
}

#[async_trait]
impl ContentProvider for DdgSearchProvider {
    fn name(&self) -> &'static str {
        "websearch"
    }

    async fn fetch(&self, subject: &str, _language: &str) -> Result<Option<SourceItem>> {
        let resp = self
            .client
            .get(DDG_HTML_BASE)
            .header("User-Agent", USER_AGENT)
            .query(&[("q", format!("{subject} latest news"))])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        if !resp.status().is_success() {
            anyhow::bail!("web search HTTP {}", resp.status().as_u16());
        }

        let page = resp.text().await?;
        let Some(result) = result_regex()?.captures(&page) else {
            return Ok(None);
        };

        let url = resolve_result_url(&result[1]);
        let title = strip_tags(&result[2]);
        if title.is_empty() {
            return Ok(None);
        }

        let body = snippet_regex()?
            .captures(&page)
            .map(|cap| strip_tags(&cap[1]))
            .unwrap_or_default();

        Ok(Some(SourceItem { title, body, url }))
    }
}
