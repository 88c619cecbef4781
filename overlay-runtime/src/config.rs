//! Session configuration

use crate::{Millis, OverlapPolicy, Result};
use serde::{Deserialize, Serialize};

/// Session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Poll interval while playing or while a detail view is open
    pub poll_interval_ms: Millis,
    /// Poll interval while paused with no detail view open
    pub idle_interval_ms: Millis,
    /// Force a transition's end state if its completion has not arrived in
    /// time (None waits forever)
    pub transition_timeout_ms: Option<Millis>,
    /// Precedence between overlapping windows claiming the same slot
    pub overlap_policy: OverlapPolicy,
    /// Close the detail view when its activation's time window ends
    pub close_detail_on_window_exit: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 15,
            idle_interval_ms: 500,
            transition_timeout_ms: Some(2000),
            overlap_policy: OverlapPolicy::LastDeclared,
            close_detail_on_window_exit: false,
        }
    }
}

impl SessionConfig {
    /// Parses a JSON config; missing fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| overlay_core::Error::Malformed(e).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = SessionConfig::from_json(
            r#"{"poll_interval_ms": 30, "overlap_policy": "earliest_start"}"#,
        )
        .unwrap();
        assert_eq!(config.poll_interval_ms, 30);
        assert_eq!(config.idle_interval_ms, 500);
        assert_eq!(config.transition_timeout_ms, Some(2000));
        assert_eq!(config.overlap_policy, OverlapPolicy::EarliestStart);
    }

    #[test]
    fn test_null_timeout_disables_it() {
        let config = SessionConfig::from_json(r#"{"transition_timeout_ms": null}"#).unwrap();
        assert_eq!(config.transition_timeout_ms, None);
    }

    #[test]
    fn test_rejects_unknown_policy() {
        assert!(SessionConfig::from_json(r#"{"overlap_policy": "random"}"#).is_err());
    }
}
