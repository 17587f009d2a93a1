use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::adapters::traits::{parse_millis, parse_price, require_samples, PriceSource};
use crate::error::{AppResult, PriceError};
use crate::price_engine::PricePoint;

const FEED: &str = "coingecko";

pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com";

/// CoinGecko `market_chart/range` client.
///
/// The range endpoint returns `{"prices": [[ms, price], ...], ...}` with
/// hourly granularity for multi-day windows and ~5 minute granularity below.
pub struct CoinGeckoSource {
    client: Client,
    base_url: String,
}

impl CoinGeckoSource {
    pub fn new(base_url: &str, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn parse_range(body: &Value) -> Result<Vec<PricePoint>, PriceError> {
        let rows = body
            .get("prices")
            .and_then(Value::as_array)
            .ok_or_else(|| PriceError::unavailable(FEED, "response has no prices array"))?;

        let points = rows
            .iter()
            .map(|row| {
                let pair = row.as_array().filter(|pair| pair.len() >= 2)?;
                Some(PricePoint::new(parse_millis(&pair[0])?, parse_price(&pair[1])?))
            })
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| PriceError::unavailable(FEED, "malformed price row"))?;

        require_samples(FEED, points)
    }
}

#[async_trait]
impl PriceSource for CoinGeckoSource {
    fn name(&self) -> &'static str {
        FEED
    }

    async fn fetch_points(&self, coin_id: &str, start: i64, end: i64) -> AppResult<Vec<PricePoint>> {
        let url = format!("{}/api/v3/coins/{}/market_chart/range", self.base_url, coin_id);
        let from = start.to_string();
        let to = end.to_string();

        let response = self
            .client
            .get(&url)
            .query(&[("vs_currency", "usd"), ("from", from.as_str()), ("to", to.as_str())])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| PriceError::unavailable(FEED, e.to_string()))?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| PriceError::unavailable(FEED, e.to_string()))?;

        let points = Self::parse_range(&body)?;
        debug!("📈 {} returned {} samples for {}", FEED, points.len(), coin_id);
        Ok(points)
    }
}
