//! In-memory adapters for tests and single-node development.

mod notification_store;

pub use notification_store::InMemoryNotificationStore;
