use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::adapters::traits::{parse_millis, parse_price, require_samples, PriceSource};
use crate::error::{AppResult, PriceError};
use crate::price_engine::PricePoint;

const FEED: &str = "binance";

pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";

/// Candle width requested from the klines endpoint
const KLINE_INTERVAL: &str = "30m";

/// Binance caps a single klines page at 1000 candles (~20 days of 30m candles)
const KLINE_LIMIT: &str = "1000";

/// Binance spot klines client.
///
/// Each kline is `[open_time_ms, open, high, low, close, volume, close_time_ms, ...]`
/// with prices as decimal strings. A candle is sampled as the midpoint of its
/// high and low.
pub struct BinanceSource {
    client: Client,
    base_url: String,
}

impl BinanceSource {
    pub fn new(base_url: &str, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn parse_klines(body: &Value) -> Result<Vec<PricePoint>, PriceError> {
        let rows = match body {
            Value::Array(rows) => rows,
            // errors come back as {"code": -1121, "msg": "Invalid symbol."}
            Value::Object(obj) => {
                let msg = obj
                    .get("msg")
                    .and_then(Value::as_str)
                    .unwrap_or("unexpected object response");
                return Err(PriceError::unavailable(FEED, msg));
            }
            _ => return Err(PriceError::unavailable(FEED, "unexpected response shape")),
        };

        let points = rows
            .iter()
            .map(|row| {
                let kline = row.as_array().filter(|k| k.len() >= 4)?;
                let high = parse_price(&kline[2])?;
                let low = parse_price(&kline[3])?;
                Some(PricePoint::new(parse_millis(&kline[0])?, (high + low) / 2.0))
            })
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| PriceError::unavailable(FEED, "malformed kline row"))?;

        require_samples(FEED, points)
    }
}

#[async_trait]
impl PriceSource for BinanceSource {
    fn name(&self) -> &'static str {
        FEED
    }

    async fn fetch_points(&self, symbol: &str, start: i64, end: i64) -> AppResult<Vec<PricePoint>> {
        let url = format!("{}/api/v3/klines", self.base_url);
        let start_ms = (start * 1000).to_string();
        let end_ms = (end * 1000).to_string();

        let response = self
            .client
            .get(&url)
            .query(&[
                ("symbol", symbol),
                ("interval", KLINE_INTERVAL),
                ("limit", KLINE_LIMIT),
                ("startTime", start_ms.as_str()),
                ("endTime", end_ms.as_str()),
            ])
            .send()
            .await
            .map_err(|e| PriceError::unavailable(FEED, e.to_string()))?;

        // Binance reports bad symbols with a 4xx and a JSON body worth surfacing
        let body: Value = response
            .json()
            .await
            .map_err(|e| PriceError::unavailable(FEED, e.to_string()))?;

        let points = Self::parse_klines(&body)?;
        debug!("📈 {} returned {} candles for {}", FEED, points.len(), symbol);
        Ok(points)
    }
}
