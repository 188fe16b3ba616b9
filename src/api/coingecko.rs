use crate::capability::MarketData;
use crate::content::MarketSnapshot;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// CoinGecko markets endpoint, USD quotes.
pub struct CoinGeckoMarket {
    client: Client,
    base_url: String,
}

impl CoinGeckoMarket {
    pub fn new(client: Client, base_url: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MarketRow {
    current_price: Option<f64>,
    price_change_percentage_24h: Option<f64>,
    #[serde(rename = "price_change_percentage_7d_in_currency")]
    price_change_percentage_7d: Option<f64>,
    market_cap: Option<f64>,
    total_volume: Option<f64>,
}

#[async_trait]
impl MarketData for CoinGeckoMarket {
    async fn snapshot(&self, asset_id: &str) -> Result<Option<MarketSnapshot>> {
        let resp = self
            .client
            .get(format!("{}/coins/markets", self.base_url))
            .query(&[
                ("vs_currency", "usd"),
                ("ids", asset_id),
                ("price_change_percentage", "7d"),
            ])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        if !resp.status().is_success() {
            anyhow::bail!("market data HTTP {}", resp.status().as_u16());
        }

        let rows: Vec<MarketRow> = resp.json().await?;
        let Some(row) = rows.into_iter().next() else {
            return Ok(None);
        };

        Ok(Some(MarketSnapshot {
            price: row.current_price,
            change_24h: row.price_change_percentage_24h,
            change_7d: row.price_change_percentage_7d,
            market_cap: row.market_cap,
            volume: row.total_volume,
        }))
    }
}
