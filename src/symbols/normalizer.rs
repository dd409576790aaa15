use crate::symbols::models::{BackendId, DeferredLocation, SymbolRecord};
use crate::symbols::wire::{
    RawBackendResult, SymbolInformation, WorkspaceSymbol, WorkspaceSymbolLocation,
};

/// Convert one backend's raw answer into canonical records.
///
/// Absent optional fields stay absent. Lazy workspace symbols keep their
/// resource and `data` so the origin backend can resolve them later.
pub fn normalize(raw: RawBackendResult, origin: &BackendId) -> Vec<SymbolRecord> {
    match raw {
        RawBackendResult::Legacy(symbols) => symbols
            .into_iter()
            .map(|symbol| from_symbol_information(symbol, origin))
            .collect(),
        RawBackendResult::Workspace(symbols) => symbols
            .into_iter()
            .map(|symbol| from_workspace_symbol(symbol, origin))
            .collect(),
    }
}

fn from_symbol_information(symbol: SymbolInformation, origin: &BackendId) -> SymbolRecord {
    SymbolRecord::new(
        symbol.name,
        symbol.kind,
        symbol.container_name,
        symbol.tags.unwrap_or_default(),
        symbol.deprecated.unwrap_or(false),
        Some(symbol.location),
        None,
        origin.clone(),
    )
}

fn from_workspace_symbol(symbol: WorkspaceSymbol, origin: &BackendId) -> SymbolRecord {
    let (location, deferred) = match symbol.location {
        WorkspaceSymbolLocation::Full(location) => (Some(location), None),
        WorkspaceSymbolLocation::UriOnly { uri } => (
            None,
            Some(DeferredLocation {
                uri,
                data: symbol.data,
            }),
        ),
    };

    SymbolRecord::new(
        symbol.name,
        symbol.kind,
        symbol.container_name,
        symbol.tags.unwrap_or_default(),
        false,
        location,
        deferred,
        origin.clone(),
    )
}
