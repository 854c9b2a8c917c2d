//! Back-office role tiers.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::ValidationError;

/// Role of a back-office identity.
///
/// Serialized as the string codes `"0"`..`"3"` used across the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    TeamMember,
    Agent,
    Student,
}

impl Role {
    /// Numeric code of the role.
    pub fn code(&self) -> u8 {
        match self {
            Role::Admin => 0,
            Role::TeamMember => 1,
            Role::Agent => 2,
            Role::Student => 3,
        }
    }

    /// String code as stored and sent over the wire.
    pub fn as_code_str(&self) -> &'static str {
        match self {
            Role::Admin => "0",
            Role::TeamMember => "1",
            Role::Agent => "2",
            Role::Student => "3",
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Role::Admin),
            1 => Some(Role::TeamMember),
            2 => Some(Role::Agent),
            3 => Some(Role::Student),
            _ => None,
        }
    }

    /// Admins and team members share the admin alert channel.
    pub fn is_privileged(&self) -> bool {
        matches!(self, Role::Admin | Role::TeamMember)
    }

    /// Tier whose group notifications this role receives.
    pub fn group_tier(&self) -> Role {
        if self.is_privileged() {
            Role::Admin
        } else {
            *self
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u8>()
            .ok()
            .and_then(Role::from_code)
            .ok_or_else(|| ValidationError::invalid_format("role", format!("unknown role code '{}'", s)))
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_code_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawRole {
            Code(u8),
            Text(String),
        }

        match RawRole::deserialize(deserializer)? {
            RawRole::Code(code) => Role::from_code(code)
                .ok_or_else(|| serde::de::Error::custom(format!("unknown role code {}", code))),
            RawRole::Text(text) => text.parse().map_err(serde::de::Error::custom),
        }
    }
}
