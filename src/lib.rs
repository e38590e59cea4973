pub mod amount;
pub mod csv;
pub mod engine;
pub mod external;
pub mod model;

pub use amount::Amount;
pub use engine::Engine;
pub use model::{AccountId, FuelType, PaymentMethod, Principal, PumpEvent, Role};
