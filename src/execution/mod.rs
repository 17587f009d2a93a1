pub mod executor;
pub mod evm;

pub use evm::EvmSettlementExecutor;
pub use executor::SettlementExecutor;
