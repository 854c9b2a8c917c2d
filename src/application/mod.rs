//! Application layer - connection-time identity and event handling.
//!
//! Orchestrates the domain through ports; no transport or storage code
//! lives here.

mod dispatcher;
mod echo;
mod identity_resolver;

pub use dispatcher::{DispatchConfig, DispatchError, EventDispatcher};
pub use echo::DiagnosticEcho;
pub use identity_resolver::{HandshakeError, IdentityResolver};
