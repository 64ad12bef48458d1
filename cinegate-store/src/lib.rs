pub mod app_config;
pub mod booking_repo;
pub mod catalog_repo;
pub mod database;
pub mod error;
pub mod events;
pub mod inventory_repo;

pub use booking_repo::PgBookingRepository;
pub use catalog_repo::PgCatalog;
pub use database::DbClient;
pub use events::{EventProducer, KafkaNotifier};
pub use inventory_repo::PgInventoryRepository;
