pub mod window;
pub mod routes;
pub mod aggregator;

pub use aggregator::{PriceAggregator, PricingStrategy};
pub use routes::TokenRoutes;
pub use window::PricePoint;
