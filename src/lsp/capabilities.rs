use crate::symbols::backend::BackendCapabilities;
use serde_json::Value;

/// Tracked server capabilities
///
/// We track which capabilities the server advertised during initialization
/// to know which requests it will answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerCapabilities {
    /// Server supports workspace/symbol
    pub workspace_symbol: bool,
    /// Server supports workspaceSymbol/resolve
    pub workspace_symbol_resolve: bool,
    /// Server supports textDocument/documentSymbol
    pub document_symbol: bool,
    /// Name reported in serverInfo
    pub server_name: Option<String>,
    /// Version reported in serverInfo
    pub server_version: Option<String>,
}

impl ServerCapabilities {
    /// Create capabilities from LSP InitializeResult
    pub fn from_initialize_result(result: &Value) -> Self {
        let caps = result.get("capabilities").unwrap_or(result);
        let workspace_symbol = caps.get("workspaceSymbolProvider");

        let server_info = result.get("serverInfo");
        let info_string = |key: &str| {
            server_info
                .and_then(|info| info.get(key))
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        Self {
            workspace_symbol: provider_enabled(workspace_symbol),
            workspace_symbol_resolve: workspace_symbol
                .and_then(|v| v.get("resolveProvider"))
                .and_then(Value::as_bool)
                .unwrap_or(false),
            document_symbol: provider_enabled(caps.get("documentSymbolProvider")),
            server_name: info_string("name"),
            server_version: info_string("version"),
        }
    }

    pub fn backend_capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            workspace_symbol: self.workspace_symbol,
            workspace_symbol_resolve: self.workspace_symbol && self.workspace_symbol_resolve,
        }
    }
}

/// `boolean | Options` capability: `true` or any options object enables it
fn provider_enabled(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(enabled)) => *enabled,
        Some(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_capabilities_parsing() {
        let result = json!({
            "capabilities": {
                "workspaceSymbolProvider": { "resolveProvider": true },
                "documentSymbolProvider": true
            },
            "serverInfo": { "name": "rust-analyzer", "version": "0.3.2000" }
        });

        let caps = ServerCapabilities::from_initialize_result(&result);
        assert!(caps.workspace_symbol);
        assert!(caps.workspace_symbol_resolve);
        assert!(caps.document_symbol);
        assert_eq!(caps.server_name.as_deref(), Some("rust-analyzer"));
        assert!(caps.backend_capabilities().workspace_symbol_resolve);
    }

    #[test]
    fn test_explicit_false_disables() {
        let result = json!({ "capabilities": { "workspaceSymbolProvider": false } });
        let caps = ServerCapabilities::from_initialize_result(&result);
        assert!(!caps.workspace_symbol);
        assert!(!caps.backend_capabilities().workspace_symbol);
    }

    #[test]
    fn test_missing_capabilities() {
        let caps = ServerCapabilities::from_initialize_result(&json!({}));
        assert_eq!(caps, ServerCapabilities::default());
    }
}
