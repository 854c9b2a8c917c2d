//! PostgreSQL adapters - Database implementations for repository ports.

mod notification_store;

pub use notification_store::PostgresNotificationStore;
