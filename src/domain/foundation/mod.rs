//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, enums, and error types
//! that form the vocabulary of the notification domain.

mod errors;
mod identity;
mod ids;
mod role;
mod state_machine;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use identity::Identity;
pub use ids::{ConnectionId, NotificationId, UserId};
pub use role::Role;
pub use state_machine::{ConnectionState, StateMachine};
pub use timestamp::Timestamp;
