pub mod traits;
pub mod coingecko;
pub mod binance;

pub use traits::PriceSource;
pub use coingecko::CoinGeckoSource;
pub use binance::BinanceSource;
