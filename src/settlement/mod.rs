pub mod models;
pub mod due;
pub mod registry;
pub mod orchestrator;

pub use orchestrator::SettlementOrchestrator;
pub use registry::{PaymentRegistry, SubgraphRegistry};
