//! Addressable broadcast groups and emissions targeted at them.
//!
//! Channel names are shared with other instances over the broadcast
//! backbone, so their rendered form must not change.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::events::ServerEvent;
use super::foundation::{UserId, ValidationError};

/// Prefix of every private per-user channel.
pub const USER_CHANNEL_PREFIX: &str = "USER_";

/// Shared channel joined by every admin and team member connection.
pub const ADMIN_ALERT_CHANNEL: &str = "GLOBAL_ADMIN_ALERT";

/// A named channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ChannelName {
    /// `USER_<id>`, one per user id.
    User(UserId),
    /// `GLOBAL_ADMIN_ALERT`.
    AdminAlert,
}

impl ChannelName {
    pub fn user(user_id: &UserId) -> Self {
        ChannelName::User(user_id.clone())
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelName::User(id) => write!(f, "{}{}", USER_CHANNEL_PREFIX, id),
            ChannelName::AdminAlert => f.write_str(ADMIN_ALERT_CHANNEL),
        }
    }
}

impl FromStr for ChannelName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == ADMIN_ALERT_CHANNEL {
            return Ok(ChannelName::AdminAlert);
        }
        match s.strip_prefix(USER_CHANNEL_PREFIX) {
            Some(id) => Ok(ChannelName::User(UserId::new(id)?)),
            None => Err(ValidationError::invalid_format(
                "channel",
                format!("unknown channel '{}'", s),
            )),
        }
    }
}

impl TryFrom<String> for ChannelName {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ChannelName> for String {
    fn from(name: ChannelName) -> Self {
        name.to_string()
    }
}

/// Where an emission goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "channel", rename_all = "snake_case")]
pub enum EmissionTarget {
    /// Every connection joined to one channel.
    Channel(ChannelName),
    /// Every live connection, regardless of channel membership.
    Everyone,
}

impl fmt::Display for EmissionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmissionTarget::Channel(name) => write!(f, "{}", name),
            EmissionTarget::Everyone => f.write_str("*"),
        }
    }
}

/// An outbound event together with its target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Emission {
    pub target: EmissionTarget,
    pub event: ServerEvent,
}

impl Emission {
    pub fn to_channel(channel: ChannelName, event: ServerEvent) -> Self {
        Self {
            target: EmissionTarget::Channel(channel),
            event,
        }
    }

    pub fn to_everyone(event: ServerEvent) -> Self {
        Self {
            target: EmissionTarget::Everyone,
            event,
        }
    }
}
