use alloy_primitives::U256;
use async_trait::async_trait;

use crate::error::AppResult;

/// Signing identity bound to one chain, able to read token metadata and
/// submit settlement calls.
///
/// Implementations own RPC timeouts and retries; a returned error is final
/// for that call.
#[async_trait]
pub trait SettlementExecutor: Send + Sync {
    /// Chain id of the network this executor signs for
    async fn chain_id(&self) -> AppResult<u64>;

    /// ERC-20 `decimals()` of `token`
    async fn token_decimals(&self, token: &str) -> AppResult<u8>;

    /// Settle `stream_ids` on `target` at `scaled_price` for the payment
    /// instant `timestamp`. Returns the transaction hash.
    async fn settle(
        &self,
        target: &str,
        stream_ids: &[String],
        token: &str,
        scaled_price: U256,
        timestamp: i64,
    ) -> AppResult<String>;
}
