use crate::capability::{ContentProvider, MarketData};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// The single piece of source content grounding one task. An empty body
/// means no external content was found and the script falls back to generic
/// knowledge of the subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceItem {
    pub title: String,
    pub body: String,
    pub url: String,
}

impl SourceItem {
    pub fn ungrounded(subject: &str) -> Self {
        Self {
            title: subject.to_string(),
            body: String::new(),
            url: String::new(),
        }
    }

    pub fn is_grounded(&self) -> bool {
        !self.body.is_empty()
    }
}

/// Market metrics for one asset. Every field is optional; the reference
/// line renders only what is present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub price: Option<f64>,
    pub change_24h: Option<f64>,
    pub change_7d: Option<f64>,
    pub market_cap: Option<f64>,
    pub volume: Option<f64>,
}

/// Pick exactly one source item for the subject, trying providers in order.
/// Provider errors are swallowed and logged; total failure yields an
/// ungrounded item with the bare subject as title.
pub async fn select(
    providers: &[Arc<dyn ContentProvider>],
    subject: &str,
    language: &str,
) -> SourceItem {
    for provider in providers {
        match provider.fetch(subject, language).await {
            Ok(Some(item)) => {
                info!(
                    provider = provider.name(),
                    title = %item.title,
                    url = %item.url,
                    "content selected"
                );
                return item;
            }
            Ok(None) => {}
            Err(err) => {
                warn!(provider = provider.name(), "content provider failed: {err:#}");
            }
        }
    }

    warn!("no content source available, falling back to generic knowledge");
    SourceItem::ungrounded(subject)
}

/// Canonical asset id for a free-form subject. A static table, not a fuzzy
/// search: unknown subjects yield no enrichment.
pub fn normalize_asset_id(subject: &str) -> Option<&'static str> {
    match subject.trim().to_ascii_lowercase().as_str() {
        "btc" | "bitcoin" => Some("bitcoin"),
        "eth" | "ethereum" => Some("ethereum"),
        "xrp" | "ripple" => Some("ripple"),
        "xmr" | "monero" => Some("monero"),
        "doge" | "dogecoin" => Some("dogecoin"),
        "sol" | "solana" => Some("solana"),
        "pi" | "pi-network" => Some("pi-network"),
        _ => None,
    }
}

/// Render the metrics present in the snapshot into one reference line.
/// Returns an empty string when nothing is available.
pub fn render_market_line(snapshot: &MarketSnapshot) -> String {
    let mut parts = Vec::new();
    if let Some(price) = snapshot.price {
        parts.push(format!("price: ${price:.2}"));
    }
    if let Some(change) = snapshot.change_24h {
        parts.push(format!("24h: {change:+.2}%"));
    }
    if let Some(change) = snapshot.change_7d {
        parts.push(format!("7d: {change:+.2}%"));
    }
    if let Some(cap) = snapshot.market_cap {
        parts.push(format!("market cap: ${cap:.0}"));
    }
    if let Some(volume) = snapshot.volume {
        parts.push(format!("24h volume: ${volume:.0}"));
    }
    parts.join(" / ")
}

/// Optional market enrichment: resolve the subject against the static asset
/// table and fetch a snapshot. Fetch failures are tolerated; the result is
/// a reference line or an empty string.
pub async fn market_line(market: Option<&Arc<dyn MarketData>>, subject: &str) -> String {
    let Some(market) = market else {
        return String::new();
    };
    let Some(asset_id) = normalize_asset_id(subject) else {
        return String::new();
    };

    match market.snapshot(asset_id).await {
        Ok(Some(snapshot)) => {
            let line = render_market_line(&snapshot);
            if !line.is_empty() {
                info!(asset_id, "market reference: {line}");
            }
            line
        }
        Ok(None) => String::new(),
        Err(err) => {
            warn!(asset_id, "market data fetch failed: {err:#}");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;

    struct FixedProvider {
        name: &'static str,
        result: Option<SourceItem>,
        fail: bool,
    }

    #[async_trait]
    impl ContentProvider for FixedProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn fetch(&self, _subject: &str, _language: &str) -> Result<Option<SourceItem>> {
            if self.fail {
                anyhow::bail!("provider down");
            }
            Ok(self.result.clone())
        }
    }

    fn provider(
        name: &'static str,
        result: Option<SourceItem>,
        fail: bool,
    ) -> Arc<dyn ContentProvider> {
        Arc::new(FixedProvider { name, result, fail })
    }

    fn article(title: &str) -> SourceItem {
        SourceItem {
            title: title.to_string(),
            body: "some body text".to_string(),
            url: "https://example.com/a".to_string(),
        }
    }

    #[tokio::test]
    async fn first_responsive_provider_wins() {
        let providers = vec![
            provider("newsapi", None, true),
            provider("websearch", Some(article("fallback article")), false),
        ];
        let item = select(&providers, "bitcoin", "en-US").await;
        assert_eq!(item.title, "fallback article");
        assert!(item.is_grounded());
    }

    #[tokio::test]
    async fn priority_order_is_strict() {
        let providers = vec![
            provider("newsapi", Some(article("first")), false),
            provider("websearch", Some(article("second")), false),
        ];
        let item = select(&providers, "bitcoin", "en-US").await;
        assert_eq!(item.title, "first");
    }

    #[tokio::test]
    async fn total_failure_yields_ungrounded_subject() {
        let providers = vec![
            provider("newsapi", None, true),
            provider("websearch", None, false),
        ];
        let item = select(&providers, "unknown-asset-zzz", "en-US").await;
        assert_eq!(item.title, "unknown-asset-zzz");
        assert!(item.body.is_empty());
        assert!(item.url.is_empty());
        assert!(!item.is_grounded());
    }

    #[test]
    fn asset_table_is_exact() {
        assert_eq!(normalize_asset_id("bitcoin"), Some("bitcoin"));
        assert_eq!(normalize_asset_id("  BTC "), Some("bitcoin"));
        assert_eq!(normalize_asset_id("sol"), Some("solana"));
        assert_eq!(normalize_asset_id("bitcoin cash"), None);
        assert_eq!(normalize_asset_id("unknown-asset-zzz"), None);
    }

    #[test]
    fn market_line_renders_present_fields_only() {
        let snapshot = MarketSnapshot {
            price: Some(64250.5),
            change_24h: Some(-1.25),
            change_7d: None,
            market_cap: None,
            volume: Some(31e9),
        };
        let line = render_market_line(&snapshot);
        assert!(line.contains("price: $64250.50"));
        assert!(line.contains("24h: -1.25%"));
        assert!(!line.contains("7d"));
        assert!(!line.contains("market cap"));
        assert!(line.contains("24h volume"));
    }

    #[test]
    fn empty_snapshot_renders_empty_line() {
        assert_eq!(render_market_line(&MarketSnapshot::default()), "");
    }
}
