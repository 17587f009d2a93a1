use std::str::FromStr;

use alloy_primitives::{Address, U256};
use alloy_provider::network::{EthereumWallet, ReceiptResponse as _};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::sol;
use async_trait::async_trait;
use tracing::{info, instrument};

use crate::error::{AppError, AppResult, SettlementError};
use crate::execution::executor::SettlementExecutor;

sol! {
    #[sol(rpc)]
    contract IERC20Metadata {
        function decimals() external view returns (uint8);
    }

    #[sol(rpc)]
    contract IScheduledTransfers {
        function withdraw(uint256[] calldata ids, address _token, uint256 _price, uint256 _timestamp) external;
    }
}

/// EVM executor backed by a local private-key signer over HTTP JSON-RPC
pub struct EvmSettlementExecutor {
    signer: PrivateKeySigner,
    rpc_url: url::Url,
}

impl EvmSettlementExecutor {
    pub fn new(private_key: &str, rpc_url: &str) -> AppResult<Self> {
        if private_key.trim().is_empty() {
            return Err(AppError::Config("signer private key is empty".to_string()));
        }

        let signer = PrivateKeySigner::from_str(private_key.trim())
            .map_err(|e| AppError::Config(format!("invalid signer private key: {e}")))?;
        let rpc_url = rpc_url
            .parse()
            .map_err(|e: url::ParseError| AppError::Config(format!("invalid RPC url {rpc_url}: {e}")))?;

        Ok(Self { signer, rpc_url })
    }

    pub fn signer_address(&self) -> Address {
        self.signer.address()
    }

    fn parse_address(step: &'static str, value: &str) -> AppResult<Address> {
        Address::from_str(value)
            .map_err(|e| AppError::from(SettlementError::step(step, format!("invalid address {value}: {e}"))))
    }

    fn parse_stream_ids(stream_ids: &[String]) -> AppResult<Vec<U256>> {
        stream_ids
            .iter()
            .map(|id| {
                U256::from_str(id).map_err(|e| {
                    AppError::from(SettlementError::step("settle", format!("invalid stream id {id}: {e}")))
                })
            })
            .collect()
    }
}

#[async_trait]
impl SettlementExecutor for EvmSettlementExecutor {
    async fn chain_id(&self) -> AppResult<u64> {
        let provider = ProviderBuilder::new().connect_http(self.rpc_url.clone());
        provider
            .get_chain_id()
            .await
            .map_err(|e| AppError::from(SettlementError::step("chain_id", e.to_string())))
    }

    async fn token_decimals(&self, token: &str) -> AppResult<u8> {
        let provider = ProviderBuilder::new().connect_http(self.rpc_url.clone());
        let erc20 = IERC20Metadata::new(Self::parse_address("decimals", token)?, &provider);

        erc20
            .decimals()
            .call()
            .await
            .map_err(|e| AppError::from(SettlementError::step("decimals", e.to_string())))
    }

    #[instrument(skip(self, stream_ids), fields(streams = stream_ids.len()))]
    async fn settle(
        &self,
        target: &str,
        stream_ids: &[String],
        token: &str,
        scaled_price: U256,
        timestamp: i64,
    ) -> AppResult<String> {
        let pool_address = Self::parse_address("settle", target)?;
        let token_address = Self::parse_address("settle", token)?;
        let ids = Self::parse_stream_ids(stream_ids)?;
        let timestamp = u64::try_from(timestamp)
            .map_err(|_| SettlementError::step("settle", format!("negative timestamp {timestamp}")))?;

        let wallet = EthereumWallet::from(self.signer.clone());
        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .connect_http(self.rpc_url.clone());
        let pool = IScheduledTransfers::new(pool_address, &provider);

        let pending = pool
            .withdraw(ids, token_address, scaled_price, U256::from(timestamp))
            .send()
            .await
            .map_err(|e| SettlementError::step("settle", format!("failed to send withdraw: {e}")))?;

        let receipt = pending
            .get_receipt()
            .await
            .map_err(|e| SettlementError::step("settle", format!("failed to get receipt: {e}")))?;

        let tx_hash = format!("{:?}", receipt.transaction_hash);
        if !receipt.status() {
            return Err(AppError::from(SettlementError::step("settle", format!("withdraw reverted in {tx_hash}"))));
        }

        info!("✓ withdraw mined on {} (tx: {})", target, tx_hash);
        Ok(tx_hash)
    }
}
