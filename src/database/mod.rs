pub mod manager;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod schema;
pub mod store;

pub use manager::{DatabaseError, DatabaseManager};
pub use memory::MemoryRegistrationStore;
pub use postgres::PgRegistrationStore;
pub use store::{RegistrationStore, StatusChange, StoreError};
