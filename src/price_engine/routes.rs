use std::collections::HashMap;

use crate::error::PriceError;

/// Source identifiers for one token: the CoinGecko coin id and, when the
/// token trades there, the Binance symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRoute {
    pub primary: String,
    pub secondary: Option<String>,
}

/// Static (chain id, token address) -> source id table.
///
/// Addresses are stored and looked up lowercased.
#[derive(Debug, Clone, Default)]
pub struct TokenRoutes {
    routes: HashMap<(u64, String), TokenRoute>,
}

impl TokenRoutes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_route(
        mut self,
        chain_id: u64,
        token: &str,
        primary: &str,
        secondary: Option<&str>,
    ) -> Self {
        self.routes.insert(
            (chain_id, token.to_lowercase()),
            TokenRoute {
                primary: primary.to_string(),
                secondary: secondary.map(str::to_string),
            },
        );
        self
    }

    /// Tokens the production pools settle in
    pub fn builtin() -> Self {
        Self::new()
            // WBTC
            .with_route(
                1,
                "0x2260fac5e5542a773aa44fbcfedf7c193bc2c599",
                "bitcoin",
                Some("BTCUSDT"),
            )
            .with_route(1, "0x1e4746dc744503b53b4a082cb3607b169a289090", "ipor", None)
            // Goerli test ETH
            .with_route(
                5,
                "0x58d7ccbe88fe805665eb0b6c219f2c27d351e649",
                "ethereum",
                Some("ETHUSDT"),
            )
            // OP
            .with_route(
                10,
                "0x4200000000000000000000000000000000000042",
                "optimism",
                Some("OPUSDT"),
            )
    }

    pub fn get(&self, chain_id: u64, token: &str) -> Option<&TokenRoute> {
        self.routes.get(&(chain_id, token.to_lowercase()))
    }

    pub fn resolve(&self, chain_id: u64, token: &str) -> Result<&TokenRoute, PriceError> {
        self.get(chain_id, token).ok_or_else(|| PriceError::UnknownToken {
            chain_id,
            token: token.to_lowercase(),
        })
    }

    /// Resolve a route that carries both source ids
    pub fn resolve_pair(&self, chain_id: u64, token: &str) -> Result<(&str, &str), PriceError> {
        let route = self.resolve(chain_id, token)?;
        match &route.secondary {
            Some(secondary) => Ok((route.primary.as_str(), secondary.as_str())),
            None => Err(PriceError::UnknownToken {
                chain_id,
                token: token.to_lowercase(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
