use crate::capability::ContentProvider;
use crate::content::SourceItem;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Structured news search against the NewsAPI `everything` endpoint,
/// most-recent article first.
pub struct NewsApiProvider {
    client: Client,
    api_key: String,
}

impl NewsApiProvider {
    pub fn new(client: Client, api_key: String) -> Self {
        Self { client, api_key }
    }
}

#[derive(Debug, Deserialize)]
struct NewsResponse {
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
struct Article {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    url: String,
}

/// "en-US" style tags reduce to the bare language code NewsAPI expects.
fn language_code(language: &str) -> &str {
    language.split('-').next().unwrap_or(language)
}

#[async_trait]
impl ContentProvider for NewsApiProvider {
    fn name(&self) -> &'static str {
        "newsapi"
    }

    async fn fetch(&self, subject: &str, language: &str) -> Result<Option<SourceItem>> {
        if self.api_key.is_empty() {
            return Ok(None);
        }

        let resp = self
            .client
            .get("https://newsapi.org/v2/everything")
            .query(&[
                ("q", subject),
                ("language", language_code(language)),
                ("sortBy", "publishedAt"),
                ("pageSize", "5"),
                ("apiKey", self.api_key.as_str()),
            ])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        if !resp.status().is_success() {
            anyhow::bail!("newsapi HTTP {}", resp.status().as_u16());
        }

        let data: NewsResponse = resp.json().await?;
        let Some(article) = data.articles.into_iter().next() else {
            return Ok(None);
        };

        let body = [
            article.description.unwrap_or_default(),
            article.content.unwrap_or_default(),
        ]
        .join("\n")
        .trim()
        .to_string();

        Ok(Some(SourceItem {
            title: article.title,
            body,
            url: article.url,
        }))
    }
}
