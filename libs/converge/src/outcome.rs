//! Terminal operation results.

use serde::Serialize;
use serde_json::Value;

/// The result record of a successful (or soft-successful) invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationResult {
    /// Whether a mutation was issued.
    pub changed: bool,

    /// Structured payload for query actions and post-change reads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<Value>,

    /// Caller-visible warning on soft-success paths.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl OperationResult {
    /// No mutation was needed.
    pub fn noop() -> Self {
        Self {
            changed: false,
            info: None,
            warning: None,
        }
    }

    /// A mutation was issued and converged.
    pub fn applied() -> Self {
        Self {
            changed: true,
            info: None,
            warning: None,
        }
    }

    pub fn with_info(mut self, info: Value) -> Self {
        self.info = Some(info);
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warning = Some(warning.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialization_omits_empty_fields() {
        let json = serde_json::to_value(OperationResult::noop()).unwrap();
        assert_eq!(json, serde_json::json!({"changed": false}));

        let json = serde_json::to_value(
            OperationResult::applied().with_warning("connectivity did not establish"),
        )
        .unwrap();
        assert_eq!(json["changed"], true);
        assert_eq!(json["warning"], "connectivity did not establish");
    }
}
