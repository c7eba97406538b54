pub mod events;
pub mod pricing;
pub mod session;

pub use events::{RelayEvent, UsageRecord};
pub use pricing::{ModelPrice, PriceTable};
pub use session::{RelaySession, TurnRequest};
