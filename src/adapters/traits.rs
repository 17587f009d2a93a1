use async_trait::async_trait;
use serde_json::Value;

use crate::error::{AppResult, PriceError};
use crate::price_engine::window::median_of;
use crate::price_engine::PricePoint;

/// A market-data source that can turn a time window into price samples.
///
/// Implementations own the transport and the normalization of their wire
/// format; the median/TWAP math stays in `price_engine::window`.
#[async_trait]
pub trait PriceSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Normalized samples for `external_id` over `[start, end]` (unix seconds).
    /// An empty or malformed response is `PriceError::SourceUnavailable`.
    async fn fetch_points(&self, external_id: &str, start: i64, end: i64)
        -> AppResult<Vec<PricePoint>>;

    /// Median of the window's samples
    async fn fetch_scalar_price(&self, external_id: &str, start: i64, end: i64) -> AppResult<f64> {
        let points = self.fetch_points(external_id, start, end).await?;
        Ok(median_of(&points)?)
    }
}

/// Read a price encoded either as a JSON number or a numeric string.
pub(crate) fn parse_price(value: &Value) -> Option<f64> {
    let price = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (price.is_finite() && price > 0.0).then_some(price)
}

/// Read a millisecond timestamp and convert it to unix seconds.
pub(crate) fn parse_millis(value: &Value) -> Option<i64> {
    let millis = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    Some(millis.div_euclid(1000))
}

pub(crate) fn require_samples(
    feed: &'static str,
    points: Vec<PricePoint>,
) -> Result<Vec<PricePoint>, PriceError> {
    if points.is_empty() {
        return Err(PriceError::unavailable(feed, "no samples in window"));
    }
    Ok(points)
}
