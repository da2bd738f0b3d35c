//! Diagnostic model shared by every analysis pass.
//!
//! Errors are accumulated, never thrown: a single compile attempt surfaces
//! every problem at once. Each error is addressed by a JSON-Pointer-style
//! `path` rooted at the relevant subtree (`/actions/0/steps/2/value/left`),
//! which external tooling parses for diagnostics.

use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════════════
// ERROR CODES
// ═══════════════════════════════════════════════════════════════════════════════

// Reference errors (carry a "did you mean" suggestion when one is close).
pub const UNDEFINED_STATE: &str = "UNDEFINED_STATE";
pub const UNDEFINED_ACTION: &str = "UNDEFINED_ACTION";
pub const UNDEFINED_VAR: &str = "UNDEFINED_VAR";
pub const UNDEFINED_PARAM: &str = "UNDEFINED_PARAM";
pub const UNDEFINED_ROUTE_PARAM: &str = "UNDEFINED_ROUTE_PARAM";
pub const UNDEFINED_IMPORT: &str = "UNDEFINED_IMPORT";
pub const UNDEFINED_DATA: &str = "UNDEFINED_DATA";
pub const UNDEFINED_REF: &str = "UNDEFINED_REF";
pub const UNDEFINED_STYLE: &str = "UNDEFINED_STYLE";
pub const UNDEFINED_VARIANT: &str = "UNDEFINED_VARIANT";
pub const COMPONENT_NOT_FOUND: &str = "COMPONENT_NOT_FOUND";

// Declaration-missing errors: the feature is not configured at all, which is
// a different problem than a wrong name.
pub const ROUTE_NOT_DEFINED: &str = "ROUTE_NOT_DEFINED";
pub const IMPORTS_NOT_DEFINED: &str = "IMPORTS_NOT_DEFINED";
pub const DATA_NOT_DEFINED: &str = "DATA_NOT_DEFINED";

// Structural / semantic errors.
pub const DUPLICATE_ACTION: &str = "DUPLICATE_ACTION";
pub const COMPONENT_CYCLE: &str = "COMPONENT_CYCLE";
pub const COMPONENT_PROP_MISSING: &str = "COMPONENT_PROP_MISSING";
pub const SCHEMA_ERROR: &str = "SCHEMA_ERROR";

// Type / operation errors.
pub const OPERATION_INVALID_FOR_TYPE: &str = "OPERATION_INVALID_FOR_TYPE";
pub const OPERATION_MISSING_FIELD: &str = "OPERATION_MISSING_FIELD";

// Action-specific validation.
pub const INVALID_STORAGE_OPERATION: &str = "INVALID_STORAGE_OPERATION";
pub const INVALID_STORAGE_TYPE: &str = "INVALID_STORAGE_TYPE";
pub const STORAGE_SET_MISSING_VALUE: &str = "STORAGE_SET_MISSING_VALUE";
pub const INVALID_CLIPBOARD_OPERATION: &str = "INVALID_CLIPBOARD_OPERATION";
pub const CLIPBOARD_WRITE_MISSING_VALUE: &str = "CLIPBOARD_WRITE_MISSING_VALUE";
pub const INVALID_NAVIGATE_TARGET: &str = "INVALID_NAVIGATE_TARGET";

// Front-door failure for unparseable input.
pub const PARSE_ERROR: &str = "PARSE_ERROR";

// ═══════════════════════════════════════════════════════════════════════════════
// ERROR VALUE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstelaError {
    pub code: String,
    pub message: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl ConstelaError {
    pub fn new(code: &str, message: impl Into<String>, path: impl Into<String>) -> Self {
        ConstelaError {
            code: code.to_string(),
            message: message.into(),
            path: path.into(),
            suggestion: None,
            context: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: Option<String>) -> Self {
        self.suggestion = suggestion;
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// Closest candidate by edit distance. Only makes a recommendation when the
/// distance is low, so unrelated names never surface as suggestions.
pub fn suggest_name<'a, I>(target: &str, candidates: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<&str> = None;
    let mut lowest = usize::MAX;
    for name in candidates {
        let distance = edit_distance::edit_distance(target, name);
        if distance < lowest {
            lowest = distance;
            best = Some(name);
        }
    }
    if lowest < 3 {
        best.map(|s| s.to_string())
    } else {
        None
    }
}
