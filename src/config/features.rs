//! Feature flags configuration

use serde::Deserialize;

/// Feature flags for enabling/disabling functionality
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureFlags {
    /// Re-check the connection's role on every admin-scoped event
    #[serde(default = "default_strict_event_authorization")]
    pub strict_event_authorization: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            strict_event_authorization: default_strict_event_authorization(),
        }
    }
}

fn default_strict_event_authorization() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_flags_defaults() {
        assert!(FeatureFlags::default().strict_event_authorization);
    }

    #[test]
    fn test_feature_flags_deserialization() {
        let flags: FeatureFlags =
            serde_json::from_str(r#"{"strict_event_authorization": false}"#).unwrap();
        assert!(!flags.strict_event_authorization);

        let empty: FeatureFlags = serde_json::from_str("{}").unwrap();
        assert!(empty.strict_event_authorization);
    }
}
