//! Wire shapes returned by `workspace/symbol`
//!
//! A backend answers with either the legacy flat `SymbolInformation[]` or the
//! richer `WorkspaceSymbol[]`. The two are told apart once, here, and never
//! re-inspected downstream.

use crate::error::{Result, SymbolError};
use crate::symbols::models::{Location, SymbolKind, SymbolTag};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Legacy flat symbol shape with an eagerly resolved location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInformation {
    pub name: String,
    pub kind: SymbolKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<SymbolTag>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<bool>,
    pub location: Location,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
}

/// Location of a `WorkspaceSymbol`: either fully resolved or only the
/// resource, with the range left for `workspaceSymbol/resolve`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkspaceSymbolLocation {
    Full(Location),
    UriOnly { uri: String },
}

impl WorkspaceSymbolLocation {
    pub fn uri(&self) -> &str {
        match self {
            WorkspaceSymbolLocation::Full(location) => &location.uri,
            WorkspaceSymbolLocation::UriOnly { uri } => uri,
        }
    }
}

/// Richer workspace symbol shape, possibly with a lazily resolved location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceSymbol {
    pub name: String,
    pub kind: SymbolKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<SymbolTag>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
    pub location: WorkspaceSymbolLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Raw answer of one backend
#[derive(Debug, Clone, PartialEq)]
pub enum RawBackendResult {
    Legacy(Vec<SymbolInformation>),
    Workspace(Vec<WorkspaceSymbol>),
}

impl RawBackendResult {
    /// Decode the `result` member of a `workspace/symbol` response.
    ///
    /// `null` is an empty answer. An array is read as the workspace shape as
    /// soon as one element carries `data` or a location without a range,
    /// otherwise as the legacy shape.
    pub fn from_response(value: Value) -> Result<Self> {
        let items = match value {
            Value::Null => return Ok(RawBackendResult::Legacy(Vec::new())),
            Value::Array(items) => items,
            other => {
                return Err(SymbolError::MalformedResponse(format!(
                    "expected symbol array, got {}",
                    json_type_name(&other)
                )))
            }
        };

        let decode_err = |e: serde_json::Error| SymbolError::MalformedResponse(e.to_string());

        if items.iter().any(is_workspace_shaped) {
            let symbols = serde_json::from_value(Value::Array(items)).map_err(decode_err)?;
            Ok(RawBackendResult::Workspace(symbols))
        } else {
            let symbols = serde_json::from_value(Value::Array(items)).map_err(decode_err)?;
            Ok(RawBackendResult::Legacy(symbols))
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RawBackendResult::Legacy(symbols) => symbols.len(),
            RawBackendResult::Workspace(symbols) => symbols.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn is_workspace_shaped(item: &Value) -> bool {
    if item.get("data").is_some() {
        return true;
    }
    item.get("location")
        .map(|location| location.get("range").is_none())
        .unwrap_or(false)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_is_empty_legacy() {
        let raw = RawBackendResult::from_response(Value::Null).unwrap();
        assert_eq!(raw, RawBackendResult::Legacy(vec![]));
        assert!(raw.is_empty());
    }

    #[test]
    fn test_legacy_shape_detected() {
        let raw = RawBackendResult::from_response(json!([{
            "name": "main",
            "kind": 12,
            "location": {
                "uri": "file:///src/main.rs",
                "range": {
                    "start": { "line": 3, "character": 0 },
                    "end": { "line": 9, "character": 1 }
                }
            },
            "containerName": "app"
        }]))
        .unwrap();

        match raw {
            RawBackendResult::Legacy(symbols) => {
                assert_eq!(symbols.len(), 1);
                assert_eq!(symbols[0].kind, SymbolKind::Function);
                assert_eq!(symbols[0].container_name.as_deref(), Some("app"));
            }
            other => panic!("expected legacy shape, got {:?}", other),
        }
    }

    #[test]
    fn test_workspace_shape_detected_by_uri_only_location() {
        let raw = RawBackendResult::from_response(json!([{
            "name": "Handler",
            "kind": 5,
            "location": { "uri": "file:///src/handler.py" },
            "data": { "id": 42 }
        }]))
        .unwrap();

        match raw {
            RawBackendResult::Workspace(symbols) => {
                assert_eq!(symbols.len(), 1);
                assert_eq!(
                    symbols[0].location,
                    WorkspaceSymbolLocation::UriOnly {
                        uri: "file:///src/handler.py".to_string()
                    }
                );
                assert_eq!(symbols[0].data, Some(json!({ "id": 42 })));
            }
            other => panic!("expected workspace shape, got {:?}", other),
        }
    }

    #[test]
    fn test_non_array_is_malformed() {
        let err = RawBackendResult::from_response(json!({ "items": [] })).unwrap_err();
        assert_eq!(err.error_code(), "MALFORMED_RESPONSE");
    }

    #[test]
    fn test_missing_fields_are_malformed() {
        let err = RawBackendResult::from_response(json!([{ "name": "x" }])).unwrap_err();
        assert!(matches!(err, SymbolError::MalformedResponse(_)));
    }
}
