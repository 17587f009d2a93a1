use crate::error::PriceError;

/// A single timestamped price observation (unix seconds, quote-currency price)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub timestamp: i64,
    pub price: f64,
}

impl PricePoint {
    pub fn new(timestamp: i64, price: f64) -> Self {
        Self { timestamp, price }
    }
}

/// Median of a price window.
///
/// Points are ordered by price and the element at `round(n / 2)` is returned,
/// so even-length samples resolve to the upper median. A single sample is its
/// own median.
pub fn median_of(points: &[PricePoint]) -> Result<f64, PriceError> {
    if points.is_empty() {
        return Err(PriceError::EmptyInput);
    }

    let mut prices: Vec<f64> = points.iter().map(|p| p.price).collect();
    prices.sort_by(|a, b| a.total_cmp(b));

    let index = ((prices.len() as f64) / 2.0).round() as usize;
    Ok(prices[index.min(prices.len() - 1)])
}

/// Time-weighted average price under linear interpolation between samples.
pub fn time_weighted_average(points: &[PricePoint]) -> Result<f64, PriceError> {
    if points.is_empty() {
        return Err(PriceError::EmptyInput);
    }

    let mut sorted = points.to_vec();
    sorted.sort_by_key(|p| p.timestamp);

    let elapsed = sorted[sorted.len() - 1].timestamp - sorted[0].timestamp;
    if elapsed == 0 {
        return Err(PriceError::DegenerateWindow);
    }

    let weighted: f64 = sorted
        .windows(2)
        .map(|pair| {
            let delta = (pair[1].timestamp - pair[0].timestamp) as f64;
            delta * (pair[1].price + pair[0].price) / 2.0
        })
        .sum();

    Ok(weighted / elapsed as f64)
}
