use serde::Deserialize;

use crate::adapters::{binance, coingecko};

/// Runtime configuration, read from `ORACLE_*` environment variables
/// (e.g. `ORACLE_OPTIMISM_RPC_URL`, `ORACLE_PRIVATE_KEY`).
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_optimism_subgraph_url")]
    pub optimism_subgraph_url: String,
    #[serde(default = "default_optimism_rpc_url")]
    pub optimism_rpc_url: String,
    #[serde(default = "default_mainnet_subgraph_url")]
    pub mainnet_subgraph_url: String,
    #[serde(default = "default_mainnet_rpc_url")]
    pub mainnet_rpc_url: String,
    #[serde(default = "default_coingecko_base_url")]
    pub coingecko_base_url: String,
    #[serde(default = "default_binance_base_url")]
    pub binance_base_url: String,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// Hex private key of the settlement signer
    pub private_key: Option<String>,
}

fn default_optimism_subgraph_url() -> String {
    "https://api.thegraph.com/subgraphs/name/nemusonaneko/scheduledtransfers-optimism".to_string()
}

fn default_optimism_rpc_url() -> String {
    "https://rpc.ankr.com/optimism".to_string()
}

fn default_mainnet_subgraph_url() -> String {
    "https://api.thegraph.com/subgraphs/name/nemusonaneko/scheduled-transfers-mainnet".to_string()
}

fn default_mainnet_rpc_url() -> String {
    "https://eth.llamarpc.com".to_string()
}

fn default_coingecko_base_url() -> String {
    coingecko::DEFAULT_BASE_URL.to_string()
}

fn default_binance_base_url() -> String {
    binance::DEFAULT_BASE_URL.to_string()
}

fn default_http_timeout_secs() -> u64 {
    30
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_source(config::Environment::with_prefix("ORACLE").try_parsing(true))
    }

    pub fn from_source(env: config::Environment) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(env)
            .build()?
            .try_deserialize()
    }
}
