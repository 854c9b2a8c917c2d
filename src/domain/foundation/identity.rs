//! Identity established once per connection at handshake.
//!
//! The handshake credential is issued by the login flow of the back office;
//! this service only decodes it. Nothing here is persisted.

use super::{Role, UserId};

/// Decoded `{id, role}` pair attached to a connection for its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: UserId,
    pub role: Role,
}

impl Identity {
    pub fn new(id: UserId, role: Role) -> Self {
        Self { id, role }
    }

    /// Whether this identity joins the shared admin channel.
    pub fn is_privileged(&self) -> bool {
        self.role.is_privileged()
    }
}
