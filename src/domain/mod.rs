//! Domain layer - notification records and the identity vocabulary.
//!
//! No I/O lives here; persistence and transport are reached through ports.

pub mod channel;
pub mod events;
pub mod foundation;
pub mod notification;
