pub mod expiry;
pub mod memory;
pub mod provisioning;
pub mod redemption;
pub mod reservation;
pub mod settlement;

pub use expiry::{ExpiryPolicy, ExpirySweeper};
pub use memory::{MemoryStore, RecordingNotifier};
pub use provisioning::ProvisioningService;
pub use redemption::RedemptionEngine;
pub use reservation::{ReservationEngine, ReservationPolicy};
pub use settlement::SettlementEngine;
