//! The persisted step record.

use serde::{Deserialize, Serialize};

/// Bucket for steps recorded outside any declared suite.
pub const NO_SUITE: &str = "no suite";
/// Bucket for steps recorded while no case is active.
pub const UNKNOWN_TEST: &str = "unknown test";
/// File identifier used when no other is known.
pub const UNKNOWN_FILE: &str = "unknown";

/// Separator between nested suite names in the persisted `suite` field.
pub const SUITE_SEPARATOR: &str = " > ";

/// One recorded execution snapshot. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// 1-based, contiguous within a case.
    pub step_number: u64,
    pub file: String,
    /// 1-based line in the original source.
    pub line: u32,
    /// 0-based column in the original source.
    pub column: u32,
    /// Binding name to captured value, in declaration order.
    pub vars: serde_json::Map<String, serde_json::Value>,
    /// Capture time, milliseconds since the Unix epoch.
    pub ts: u64,
    /// Original (unsanitized) suite names joined with `" > "`.
    pub suite: String,
    /// Original (unsanitized) case name.
    pub test: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub return_position: bool,
}

/// The `(suite, test)` key a step belongs to, with suite names kept apart
/// so each one becomes its own directory level.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CaseKey {
    pub suite_path: Vec<String>,
    pub test: String,
}

impl CaseKey {
    pub fn new(suite_path: Vec<String>, test: impl Into<String>) -> Self {
        Self {
            suite_path,
            test: test.into(),
        }
    }

    pub fn suite_label(&self) -> String {
        self.suite_path.join(SUITE_SEPARATOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_serializes_with_camel_case_keys_and_ordered_vars() {
        let mut vars = serde_json::Map::new();
        vars.insert("zeta".to_string(), serde_json::json!(1));
        vars.insert("alpha".to_string(), serde_json::json!("two"));
        let step = Step {
            step_number: 3,
            file: "src/a.js".to_string(),
            line: 4,
            column: 2,
            vars,
            ts: 1_700_000_000_000,
            suite: "Outer > Inner".to_string(),
            test: "works".to_string(),
            return_position: false,
        };
        let out = serde_json::to_string(&step).expect("serialize");
        assert!(out.starts_with("{\"stepNumber\":3,\"file\":\"src/a.js\""), "{out}");
        assert!(out.contains("\"vars\":{\"zeta\":1,\"alpha\":\"two\"}"), "{out}");
        assert!(!out.contains("returnPosition"));

        let back: Step = serde_json::from_str(&out).expect("parse");
        assert_eq!(back, step);
    }

    #[test]
    fn return_position_is_persisted_only_when_set() {
        let step = Step {
            step_number: 1,
            file: UNKNOWN_FILE.to_string(),
            line: 1,
            column: 0,
            vars: serde_json::Map::new(),
            ts: 0,
            suite: NO_SUITE.to_string(),
            test: UNKNOWN_TEST.to_string(),
            return_position: true,
        };
        let out = serde_json::to_string(&step).expect("serialize");
        assert!(out.contains("\"returnPosition\":true"));
    }

    #[test]
    fn suite_label_joins_nested_names() {
        let key = CaseKey::new(vec!["Outer".to_string(), "a/b".to_string()], "t");
        assert_eq!(key.suite_label(), "Outer > a/b");
    }
}
