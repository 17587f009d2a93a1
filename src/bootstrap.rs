use std::{sync::Arc, time::Duration};

use tracing::info;

use crate::{
    adapters::{BinanceSource, CoinGeckoSource},
    config::Config,
    error::{AppError, AppResult},
    execution::EvmSettlementExecutor,
    price_engine::{PriceAggregator, PricingStrategy, TokenRoutes},
    settlement::{SettlementOrchestrator, SubgraphRegistry},
};

/// The two independent chain pipelines of one oracle run
pub struct Pipelines {
    pub optimism: SettlementOrchestrator,
    pub mainnet: SettlementOrchestrator,
}

pub fn initialize_pipelines(config: &Config) -> AppResult<Pipelines> {
    info!("Initializing oracle components ...");

    let timeout = Duration::from_secs(config.http_timeout_secs);
    let private_key = config
        .private_key
        .as_deref()
        .ok_or_else(|| AppError::Config("ORACLE_PRIVATE_KEY must be set".to_string()))?;

    let routes = TokenRoutes::builtin();
    if routes.is_empty() {
        return Err(AppError::Config("no token routes configured".to_string()));
    }
    info!("✅ Token routes loaded: {} tokens", routes.len());

    let aggregator = Arc::new(PriceAggregator::new(
        routes,
        Arc::new(CoinGeckoSource::new(&config.coingecko_base_url, timeout)?),
        Arc::new(BinanceSource::new(&config.binance_base_url, timeout)?),
    ));
    info!("✅ Price aggregator initialized (coingecko + binance)");

    let optimism_executor = Arc::new(EvmSettlementExecutor::new(
        private_key,
        &config.optimism_rpc_url,
    )?);
    let mainnet_executor = Arc::new(EvmSettlementExecutor::new(
        private_key,
        &config.mainnet_rpc_url,
    )?);
    info!(
        "✅ Settlement signer {} registered",
        optimism_executor.signer_address()
    );

    let optimism = SettlementOrchestrator::new(
        "optimism",
        Arc::new(SubgraphRegistry::new(&config.optimism_subgraph_url, timeout)?),
        optimism_executor,
        aggregator.clone(),
        PricingStrategy::Rolling24h,
    );
    let mainnet = SettlementOrchestrator::new(
        "mainnet",
        Arc::new(SubgraphRegistry::new(&config.mainnet_subgraph_url, timeout)?),
        mainnet_executor,
        aggregator,
        PricingStrategy::WeeklyTwap,
    );

    Ok(Pipelines { optimism, mainnet })
}
