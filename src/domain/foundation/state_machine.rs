//! State machine trait and the per-connection lifecycle built on it.

use super::ValidationError;

/// Trait for status enums that represent state machines.
///
/// Implementors define valid state transitions and get validated
/// transition methods for free.
pub trait StateMachine: Sized + Copy + PartialEq + std::fmt::Debug {
    /// Returns true if transition from self to target is valid.
    fn can_transition_to(&self, target: &Self) -> bool;

    /// Returns all valid target states from current state.
    fn valid_transitions(&self) -> Vec<Self>;

    /// Performs transition with validation, returning error if invalid.
    fn transition_to(&self, target: Self) -> Result<Self, ValidationError> {
        if self.can_transition_to(&target) {
            Ok(target)
        } else {
            Err(ValidationError::invalid_format(
                "state_transition",
                format!("Cannot transition from {:?} to {:?}", self, target),
            ))
        }
    }

    /// Checks if current state is terminal (no valid outgoing transitions).
    fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }
}

/// Lifecycle of one WebSocket connection.
///
/// ```text
/// Connecting ──► Identified ──► Active ──► Disconnected
///      │              │                        ▲
///      └──────────────┴────────────────────────┘
/// ```
///
/// Only `Active` connections accept inbound events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Identified,
    Active,
    Disconnected,
}

impl ConnectionState {
    pub fn accepts_events(&self) -> bool {
        matches!(self, ConnectionState::Active)
    }
}

impl StateMachine for ConnectionState {
    fn can_transition_to(&self, target: &Self) -> bool {
        use ConnectionState::*;
        matches!(
            (self, target),
            (Connecting, Identified)
                | (Connecting, Disconnected)
                | (Identified, Active)
                | (Identified, Disconnected)
                | (Active, Disconnected)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use ConnectionState::*;
        match self {
            Connecting => vec![Identified, Disconnected],
            Identified => vec![Active, Disconnected],
            Active => vec![Disconnected],
            Disconnected => vec![],
        }
    }
}
