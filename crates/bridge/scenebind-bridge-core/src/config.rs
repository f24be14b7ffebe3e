//! Bridge configuration.

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

/// Runtime switches for a [`crate::Bridge`]. Every field has a default so a
/// partial JSON document (or `{}`) is a valid configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Report ignored assignments as [`BridgeError::ValueRejected`] instead of
    /// dropping them silently.
    pub strict_values: bool,
    /// Attribute reads of an empty kit part build the part from its default
    /// type.
    pub create_parts_on_access: bool,
    /// Populate the module namespace with every creatable node and engine
    /// class when the bridge starts.
    pub synthesize_classes_on_init: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            strict_values: false,
            create_parts_on_access: true,
            synthesize_classes_on_init: true,
        }
    }
}

impl BridgeConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| BridgeError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_documents_keep_defaults() {
        let cfg = BridgeConfig::from_json_str(r#"{"strict_values": true}"#).unwrap();
        assert!(cfg.strict_values);
        assert!(cfg.create_parts_on_access);
        assert!(cfg.synthesize_classes_on_init);
        assert_eq!(BridgeConfig::from_json_str("{}").unwrap(), BridgeConfig::default());
    }

    #[test]
    fn malformed_documents_are_config_errors() {
        let err = BridgeConfig::from_json_str(r#"{"strict_values": "yes"}"#).unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }
}
