use serde::{Deserialize, Serialize};

use crate::report::Level;

/// Interpretation options, loadable from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Preferences {
    /// Maximum number of nested function calls.
    pub call_stack_size: usize,
    /// Reports above this level are not recorded.
    pub allowed_report_level: Level,
    pub metaprogramming_level: u32,
    #[serde(rename = "arbitaryPrecisionArithmetics", alias = "arbitraryPrecisionArithmetics")]
    pub arbitrary_precision_arithmetics: bool,
    /// Filter call overloads by structural type acceptance, not only by arity and labels.
    pub structural_type_checking: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            call_stack_size: 128,
            allowed_report_level: Level::Error,
            metaprogramming_level: 3,
            arbitrary_precision_arithmetics: true,
            structural_type_checking: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let preferences: Preferences = serde_json::from_str(r#"{"callStackSize": 16}"#).unwrap();

        assert_eq!(preferences.call_stack_size, 16);
        assert_eq!(preferences.allowed_report_level, Level::Error);
        assert!(preferences.arbitrary_precision_arithmetics);
    }

    #[test]
    fn report_level_is_numeric() {
        let preferences: Preferences = serde_json::from_str(r#"{"allowedReportLevel": 1}"#).unwrap();
        assert_eq!(preferences.allowed_report_level, Level::Warning);
    }
}
