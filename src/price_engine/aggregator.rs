use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::adapters::PriceSource;
use crate::error::{AppResult, PriceError};
use crate::price_engine::routes::TokenRoutes;
use crate::price_engine::window::time_weighted_average;

pub const DAY_SECS: i64 = 24 * 3600;

/// Default lookback for the two-source consensus price
pub const ROLLING_WINDOW_SECS: i64 = DAY_SECS;

/// Default lookback for the single-source TWAP
pub const WEEKLY_WINDOW_SECS: i64 = 7 * DAY_SECS;

/// Largest accepted max/min ratio between the two sources (inclusive)
pub const MAX_SOURCE_RATIO: f64 = 1.2;

/// Which price a settlement pipeline pays out at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricingStrategy {
    /// Mean of both sources' 24h medians, after the deviation check
    Rolling24h,
    /// 7 day TWAP of the primary source
    WeeklyTwap,
}

pub fn unix_now() -> i64 {
    Utc::now().timestamp()
}

/// Reconcile two source prices.
///
/// Fails when `max / min` exceeds [`MAX_SOURCE_RATIO`]; a ratio exactly at
/// the bound is accepted. Returns the arithmetic mean otherwise.
pub fn consensus(a: f64, b: f64) -> Result<f64, PriceError> {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    let ratio = high / low;
    if ratio > MAX_SOURCE_RATIO {
        return Err(PriceError::PriceDeviation { low, high, ratio });
    }
    Ok((a + b) / 2.0)
}

/// Derives settlement prices from the two market-data sources.
///
/// Every call recomputes from fresh source data; nothing is cached.
pub struct PriceAggregator {
    routes: TokenRoutes,
    primary: Arc<dyn PriceSource>,
    secondary: Arc<dyn PriceSource>,
    clock: fn() -> i64,
}

impl PriceAggregator {
    pub fn new(
        routes: TokenRoutes,
        primary: Arc<dyn PriceSource>,
        secondary: Arc<dyn PriceSource>,
    ) -> Self {
        Self {
            routes,
            primary,
            secondary,
            clock: unix_now,
        }
    }

    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    pub async fn price(&self, strategy: PricingStrategy, chain_id: u64, token: &str) -> AppResult<f64> {
        match strategy {
            PricingStrategy::Rolling24h => {
                self.rolling_consensus_price(chain_id, token, ROLLING_WINDOW_SECS)
                    .await
            }
            PricingStrategy::WeeklyTwap => {
                self.weekly_twap_price(chain_id, token, WEEKLY_WINDOW_SECS)
                    .await
            }
        }
    }

    /// Consensus of both sources' window medians over `[now - window, now]`.
    ///
    /// Both sources are queried concurrently; if either fails the whole call
    /// fails, there is no single-source fallback.
    #[instrument(skip(self), fields(primary = self.primary.name(), secondary = self.secondary.name()))]
    pub async fn rolling_consensus_price(
        &self,
        chain_id: u64,
        token: &str,
        window_secs: i64,
    ) -> AppResult<f64> {
        let (primary_id, secondary_id) = self.routes.resolve_pair(chain_id, token)?;
        let end = (self.clock)();
        let start = end - window_secs;

        let (a, b) = tokio::try_join!(
            self.primary.fetch_scalar_price(primary_id, start, end),
            self.secondary.fetch_scalar_price(secondary_id, start, end),
        )?;

        match consensus(a, b) {
            Ok(price) => {
                info!(
                    "✓ Consensus price for {}:{} = {} ({}={}, {}={})",
                    chain_id,
                    token,
                    price,
                    self.primary.name(),
                    a,
                    self.secondary.name(),
                    b
                );
                Ok(price)
            }
            Err(e) => {
                warn!("❌ Rejected price for {}:{}: {}", chain_id, token, e);
                Err(e.into())
            }
        }
    }

    /// Time-weighted average of the primary source over `[now - window, now]`
    #[instrument(skip(self), fields(source = self.primary.name()))]
    pub async fn weekly_twap_price(&self, chain_id: u64, token: &str, window_secs: i64) -> AppResult<f64> {
        let route = self.routes.resolve(chain_id, token)?;
        let end = (self.clock)();
        let start = end - window_secs;

        let points = self.primary.fetch_points(&route.primary, start, end).await?;
        let price = time_weighted_average(&points)?;

        info!(
            "✓ TWAP price for {}:{} = {} over {} samples",
            chain_id,
            token,
            price,
            points.len()
        );
        Ok(price)
    }
}
