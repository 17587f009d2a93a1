use std::str::FromStr;
use std::sync::Arc;

use alloy_primitives::U256;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::error::{AppResult, SettlementError};
use crate::execution::SettlementExecutor;
use crate::price_engine::{PriceAggregator, PricingStrategy};
use crate::settlement::due::find_due_groups;
use crate::settlement::models::{GroupOutcome, RunSummary, SettlementGroup};
use crate::settlement::PaymentRegistry;

/// Fixed-point scale of the settlement price argument
const PRICE_SCALE: f64 = 1e28;

/// Decimals the settlement contract normalizes token amounts to
const NORMALIZED_DECIMALS: i32 = 18;

/// Convert a consensus price into the inverse fixed-point value `withdraw` expects:
/// `floor(1e28 / (price * 10^(18 - decimals)))`.
///
/// The result is truncated, never rounded, and must fit the contract's uint256.
pub fn scale_price(price: f64, decimals: u8) -> Result<U256, SettlementError> {
    if !price.is_finite() || price <= 0.0 {
        return Err(SettlementError::step("scale_price", format!("invalid price {price}")));
    }

    let offset = 10f64.powi(NORMALIZED_DECIMALS - i32::from(decimals));
    let scaled = (PRICE_SCALE / (price * offset)).floor();
    let out_of_range = || {
        SettlementError::step(
            "scale_price",
            format!("price {price} with {decimals} decimals scales out of range"),
        )
    };
    if !scaled.is_finite() || scaled < 1.0 {
        return Err(out_of_range());
    }

    // a floored f64 formats as its exact integer digits
    U256::from_str(&format!("{scaled:.0}")).map_err(|_| out_of_range())
}

/// Drives one registry/chain pipeline: find due groups, price them, settle them.
pub struct SettlementOrchestrator {
    label: String,
    registry: Arc<dyn PaymentRegistry>,
    executor: Arc<dyn SettlementExecutor>,
    aggregator: Arc<PriceAggregator>,
    strategy: PricingStrategy,
}

impl SettlementOrchestrator {
    pub fn new(
        label: &str,
        registry: Arc<dyn PaymentRegistry>,
        executor: Arc<dyn SettlementExecutor>,
        aggregator: Arc<PriceAggregator>,
        strategy: PricingStrategy,
    ) -> Self {
        Self {
            label: label.to_string(),
            registry,
            executor,
            aggregator,
            strategy,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Run one settlement pass at `now`.
    ///
    /// Only a registry failure fails the pass. Each group is settled
    /// independently; a failing group is logged and recorded in the summary
    /// while the remaining groups proceed.
    #[instrument(skip(self), fields(pipeline = %self.label, run_id = %Uuid::new_v4()))]
    pub async fn run(&self, now: i64) -> AppResult<RunSummary> {
        let records = self.registry.list_obligations().await?;
        let groups = find_due_groups(now, &records);

        if groups.is_empty() {
            info!("✓ No payments due on {}", self.label);
            return Ok(RunSummary::default());
        }

        info!("🔄 {} settlement groups due on {}", groups.len(), self.label);

        let mut summary = RunSummary::new(groups.len());
        for group in &groups {
            let outcome = match self.settle_group(group).await {
                Ok((scaled_price, transaction_hash)) => GroupOutcome::Settled {
                    key: group.key.clone(),
                    stream_ids: group.stream_ids(),
                    scaled_price,
                    transaction_hash,
                },
                Err(e) => {
                    error!(
                        settlement_target = %group.key.settlement_target,
                        "❌ Couldn't handle withdrawals for pool {}: {}",
                        group.key.settlement_target,
                        e
                    );
                    GroupOutcome::Failed {
                        key: group.key.clone(),
                        reason: e.to_string(),
                    }
                }
            };
            summary.outcomes.push(outcome);
        }

        info!(
            "✓ {} pass complete: {} settled, {} failed",
            self.label,
            summary.settled(),
            summary.failed()
        );
        Ok(summary)
    }

    #[instrument(
        skip(self, group),
        fields(
            settlement_target = %group.key.settlement_target,
            token = %group.key.token_address,
            next_due = group.key.next_due,
        )
    )]
    async fn settle_group(&self, group: &SettlementGroup) -> AppResult<(U256, String)> {
        let key = &group.key;

        let chain_id = self.executor.chain_id().await?;
        let decimals = self.executor.token_decimals(&key.token_address).await?;
        let price = self
            .aggregator
            .price(self.strategy, chain_id, &key.token_address.to_lowercase())
            .await?;
        let scaled_price = scale_price(price, decimals)?;

        info!(
            "💱 price {} ({} decimals) -> {} for streams {:?}",
            price,
            decimals,
            scaled_price,
            group.stream_ids()
        );

        let tx_hash = self
            .executor
            .settle(
                &key.settlement_target,
                &group.stream_ids(),
                &key.token_address,
                scaled_price,
                key.next_due,
            )
            .await?;

        Ok((scaled_price, tx_hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::PriceSource;
    use crate::error::AppError;
    use crate::price_engine::{PricePoint, TokenRoutes};
    use crate::settlement::models::ObligationRecord;
    use async_trait::async_trait;
    use std::sync::Mutex;

    const NOW: i64 = 1_700_000_000;
    const WBTC: &str = "0x2260fac5e5542a773aa44fbcfedf7c193bc2c599";
    const OP: &str = "0x4200000000000000000000000000000000000042";

    fn fixed_clock() -> i64 {
        NOW
    }

    struct FlatSource {
        name: &'static str,
        price: f64,
    }

    #[async_trait]
    impl PriceSource for FlatSource {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn fetch_points(&self, _id: &str, start: i64, end: i64) -> AppResult<Vec<PricePoint>> {
            Ok(vec![
                PricePoint::new(start, self.price),
                PricePoint::new(end, self.price),
            ])
        }
    }

    struct FixedRegistry(Vec<ObligationRecord>);

    #[async_trait]
    impl PaymentRegistry for FixedRegistry {
        async fn list_obligations(&self) -> AppResult<Vec<ObligationRecord>> {
            Ok(self.0.clone())
        }
    }

    struct DownRegistry;

    #[async_trait]
    impl PaymentRegistry for DownRegistry {
        async fn list_obligations(&self) -> AppResult<Vec<ObligationRecord>> {
            Err(SettlementError::Registry("subgraph unavailable".to_string()).into())
        }
    }

    /// Executor that records settle calls and fails for selected pools or tokens
    struct RecordingExecutor {
        chain_id: u64,
        decimals: u8,
        failing_targets: Vec<String>,
        failing_decimals: Vec<String>,
        settled: Mutex<Vec<(String, Vec<String>, String, U256, i64)>>,
    }

    impl RecordingExecutor {
        fn new(chain_id: u64, decimals: u8, failing_targets: &[&str]) -> Arc<Self> {
            Self::with_failures(chain_id, decimals, failing_targets, &[])
        }

        fn with_failures(
            chain_id: u64,
            decimals: u8,
            failing_targets: &[&str],
            failing_decimals: &[&str],
        ) -> Arc<Self> {
            Arc::new(Self {
                chain_id,
                decimals,
                failing_targets: failing_targets.iter().map(|t| t.to_string()).collect(),
                failing_decimals: failing_decimals.iter().map(|t| t.to_string()).collect(),
                settled: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl SettlementExecutor for RecordingExecutor {
        async fn chain_id(&self) -> AppResult<u64> {
            Ok(self.chain_id)
        }

        async fn token_decimals(&self, token: &str) -> AppResult<u8> {
            if self.failing_decimals.iter().any(|t| t == token) {
                return Err(SettlementError::step("decimals", "call reverted").into());
            }
            Ok(self.decimals)
        }

        async fn settle(
            &self,
            target: &str,
            stream_ids: &[String],
            token: &str,
            scaled_price: U256,
            timestamp: i64,
        ) -> AppResult<String> {
            if self.failing_targets.iter().any(|t| t == target) {
                return Err(SettlementError::step("settle", "execution reverted").into());
            }
            self.settled.lock().unwrap().push((
                target.to_string(),
                stream_ids.to_vec(),
                token.to_string(),
                scaled_price,
                timestamp,
            ));
            Ok(format!("0xtx{}", stream_ids.join("")))
        }
    }

    fn record(id: &str, target: &str, token: &str, last: i64) -> ObligationRecord {
        ObligationRecord {
            id: id.to_string(),
            last_settled: last,
            window_end: NOW + 86_400,
            frequency: 3_600,
            settlement_target: target.to_string(),
            token_address: token.to_string(),
        }
    }

    fn aggregator(a: f64, b: f64) -> Arc<PriceAggregator> {
        Arc::new(
            PriceAggregator::new(
                TokenRoutes::builtin(),
                Arc::new(FlatSource { name: "coingecko", price: a }),
                Arc::new(FlatSource { name: "binance", price: b }),
            )
            .with_clock(fixed_clock),
        )
    }

    fn orchestrator(
        registry: Arc<dyn PaymentRegistry>,
        executor: Arc<RecordingExecutor>,
        aggregator: Arc<PriceAggregator>,
        strategy: PricingStrategy,
    ) -> SettlementOrchestrator {
        SettlementOrchestrator::new("test", registry, executor, aggregator, strategy)
    }

    #[test]
    fn test_scale_price_truncates() {
        // 1e28 / 1.5e18 = 6666666666.67 -> truncated, not rounded
        assert_eq!(scale_price(1.5, 0).unwrap(), U256::from(6_666_666_666u64));
        assert_eq!(scale_price(3.0, 0).unwrap(), U256::from(3_333_333_333u64));
    }

    #[test]
    fn test_scale_price_decimal_offset() {
        // 6 decimals -> offset 1e12; 1e28 / (2 * 1e12) = 5e15
        assert_eq!(scale_price(2.0, 6).unwrap(), U256::from(5_000_000_000_000_000u64));
        // more than 18 decimals pushes the offset below one; ~2.5e29
        let scaled = scale_price(4.0, 20).unwrap();
        assert!(scaled > U256::from(249_999_999_999_990_000_000_000_000_000u128));
        assert!(scaled < U256::from(250_000_000_000_010_000_000_000_000_000u128));
    }

    #[test]
    fn test_scale_price_beyond_u128() {
        // cheap 18-decimal token: 1e28 / 1e-12 ~ 1e40
        let scaled = scale_price(1e-12, 18).unwrap();
        assert!(scaled > U256::from(u128::MAX));
        assert!(scaled < U256::from(u128::MAX) * U256::from(100u8));
        // past uint256 (~1.16e77) the value cannot be encoded
        assert!(scale_price(1e-60, 18).is_err());
    }

    #[test]
    fn test_scale_price_rejects_invalid_prices() {
        assert!(scale_price(0.0, 18).is_err());
        assert!(scale_price(-1.0, 18).is_err());
        assert!(scale_price(f64::NAN, 18).is_err());
        // 1e28 / (1e40 * 1) < 1
        assert!(scale_price(1e40, 18).is_err());
    }

    #[tokio::test]
    async fn test_settles_group_with_scaled_price_and_due_instant() {
        let executor = RecordingExecutor::new(10, 6, &[]);
        let registry = Arc::new(FixedRegistry(vec![
            record("1", "0xpool", OP, NOW - 7_200),
            record("2", "0xpool", OP, NOW - 7_200),
        ]));
        let orch = orchestrator(
            registry,
            executor.clone(),
            aggregator(100.0, 110.0),
            PricingStrategy::Rolling24h,
        );

        let summary = orch.run(NOW).await.unwrap();
        assert_eq!(summary.settled(), 1);
        assert_eq!(summary.failed(), 0);

        let settled = executor.settled.lock().unwrap();
        assert_eq!(settled.len(), 1);
        let (target, ids, token, scaled, timestamp) = &settled[0];
        assert_eq!(target, "0xpool");
        assert_eq!(ids, &vec!["1".to_string(), "2".to_string()]);
        assert_eq!(token, OP);
        assert_eq!(*scaled, scale_price(105.0, 6).unwrap());
        assert_eq!(*timestamp, NOW - 3_600);
    }

    #[tokio::test]
    async fn test_failed_group_does_not_block_siblings() {
        let executor = RecordingExecutor::new(10, 18, &["0xbroken"]);
        let registry = Arc::new(FixedRegistry(vec![
            record("1", "0xbroken", OP, NOW - 7_200),
            record("2", "0xhealthy", OP, NOW - 7_200),
        ]));
        let orch = orchestrator(
            registry,
            executor.clone(),
            aggregator(100.0, 110.0),
            PricingStrategy::Rolling24h,
        );

        let summary = orch.run(NOW).await.unwrap();
        assert_eq!(summary.outcomes.len(), 2);
        assert_eq!(summary.settled(), 1);
        assert_eq!(summary.failed(), 1);

        let failed = summary
            .outcomes
            .iter()
            .find_map(|o| match o {
                GroupOutcome::Failed { key, reason } => Some((key, reason)),
                _ => None,
            })
            .unwrap();
        assert_eq!(failed.0.settlement_target, "0xbroken");
        assert!(failed.1.contains("execution reverted"));

        let settled = executor.settled.lock().unwrap();
        assert_eq!(settled.len(), 1);
        assert_eq!(settled[0].0, "0xhealthy");
    }

    #[tokio::test]
    async fn test_decimals_failure_is_isolated_per_group() {
        const IPOR: &str = "0x1e4746dc744503b53b4a082cb3607b169a289090";
        let executor = RecordingExecutor::with_failures(1, 18, &[], &[IPOR]);
        let registry = Arc::new(FixedRegistry(vec![
            record("1", "0xpool", IPOR, NOW - 7_200),
            record("2", "0xpool", WBTC, NOW - 7_200),
        ]));
        let orch = orchestrator(
            registry,
            executor.clone(),
            aggregator(30_000.0, 30_000.0),
            PricingStrategy::WeeklyTwap,
        );

        let summary = orch.run(NOW).await.unwrap();
        assert_eq!(summary.due_groups, 2);
        assert_eq!(summary.settled(), 1);
        assert_eq!(summary.failed(), 1);
        assert!(summary.outcomes.iter().any(|o| matches!(
            o,
            GroupOutcome::Failed { key, reason }
                if key.token_address == IPOR && reason.contains("'decimals'")
        )));

        let settled = executor.settled.lock().unwrap();
        assert_eq!(settled.len(), 1);
        assert_eq!(settled[0].2, WBTC);
    }

    #[tokio::test]
    async fn test_price_failure_is_isolated_per_group() {
        // mainnet: WBTC is routed, the unknown token is not
        let executor = RecordingExecutor::new(1, 8, &[]);
        let registry = Arc::new(FixedRegistry(vec![
            record("1", "0xpool", "0x000000000000000000000000000000000000dead", NOW - 7_200),
            record("2", "0xpool", WBTC, NOW - 7_200),
        ]));
        let orch = orchestrator(
            registry,
            executor.clone(),
            aggregator(30_000.0, 30_000.0),
            PricingStrategy::WeeklyTwap,
        );

        let summary = orch.run(NOW).await.unwrap();
        assert_eq!(summary.settled(), 1);
        assert_eq!(summary.failed(), 1);
        assert!(summary.outcomes.iter().any(|o| matches!(
            o,
            GroupOutcome::Failed { reason, .. } if reason.contains("is not recognized")
        )));
        assert_eq!(executor.settled.lock().unwrap()[0].1, vec!["2".to_string()]);
    }

    #[tokio::test]
    async fn test_deviation_blocks_settlement() {
        let executor = RecordingExecutor::new(10, 18, &[]);
        let registry = Arc::new(FixedRegistry(vec![record("1", "0xpool", OP, NOW - 7_200)]));
        let orch = orchestrator(
            registry,
            executor.clone(),
            aggregator(100.0, 130.0),
            PricingStrategy::Rolling24h,
        );

        let summary = orch.run(NOW).await.unwrap();
        assert_eq!(summary.failed(), 1);
        assert!(executor.settled.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_nothing_due_is_a_quiet_success() {
        let executor = RecordingExecutor::new(10, 18, &[]);
        let registry = Arc::new(FixedRegistry(vec![record("1", "0xpool", OP, NOW - 60)]));
        let orch = orchestrator(
            registry,
            executor.clone(),
            aggregator(100.0, 100.0),
            PricingStrategy::Rolling24h,
        );

        let summary = orch.run(NOW).await.unwrap();
        assert!(summary.outcomes.is_empty());
        assert!(executor.settled.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_registry_failure_fails_the_pass() {
        let orch = orchestrator(
            Arc::new(DownRegistry),
            RecordingExecutor::new(10, 18, &[]),
            aggregator(100.0, 100.0),
            PricingStrategy::Rolling24h,
        );
        let err = orch.run(NOW).await.unwrap_err();
        assert!(matches!(err, AppError::Settlement(SettlementError::Registry(_))));
    }
}
