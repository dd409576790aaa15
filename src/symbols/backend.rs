use crate::error::{Result, SymbolError};
use crate::symbols::models::{BackendId, Location, QueryRequest, SymbolRecord};
use crate::symbols::wire::RawBackendResult;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Capabilities a backend advertised when it was connected
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackendCapabilities {
    /// Answers `workspace/symbol`
    pub workspace_symbol: bool,

    /// Resolves lazy workspace symbols
    pub workspace_symbol_resolve: bool,
}

/// One addressable service able to answer symbol queries
#[async_trait]
pub trait SymbolBackend: Send + Sync + 'static {
    /// Stable identifier, recorded as the origin of every record
    fn id(&self) -> &BackendId;

    fn capabilities(&self) -> BackendCapabilities;

    /// Run a workspace symbol query
    async fn workspace_symbols(&self, request: &QueryRequest) -> Result<RawBackendResult>;

    /// Resolve the location of a record this backend produced lazily
    async fn resolve_symbol(&self, record: &SymbolRecord) -> Result<Option<Location>> {
        Err(SymbolError::Unsupported(format!(
            "{} cannot resolve symbol {}",
            self.id(),
            record.name()
        )))
    }

    /// Release the connection
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

/// Whether a backend advertises workspace symbol search
pub fn supports_workspace_symbols(backend: &dyn SymbolBackend) -> bool {
    backend.capabilities().workspace_symbol
}

/// Keep only the backends that advertise workspace symbol search
pub fn retain_workspace_symbol_capable(
    backends: Vec<Arc<dyn SymbolBackend>>,
) -> Vec<Arc<dyn SymbolBackend>> {
    backends
        .into_iter()
        .filter(|backend| supports_workspace_symbols(backend.as_ref()))
        .collect()
}

/// A project a query may be scoped to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectScope {
    root: PathBuf,
}

impl ProjectScope {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `file://` URI of the project root
    pub fn root_uri(&self) -> String {
        path_to_uri(&self.root)
    }

    pub fn name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.root.display().to_string())
    }
}

/// Supplies the capable backends for a scope.
///
/// `None` means every currently active backend. An error here is the only
/// failure a query surfaces to its caller.
#[async_trait]
pub trait BackendSupplier: Send + Sync {
    async fn backends(&self, scope: Option<&ProjectScope>) -> Result<Vec<Arc<dyn SymbolBackend>>>;
}

/// Supplier over a fixed list of backends, ignoring scope
pub struct StaticSupplier {
    backends: Vec<Arc<dyn SymbolBackend>>,
}

impl StaticSupplier {
    pub fn new(backends: Vec<Arc<dyn SymbolBackend>>) -> Self {
        Self {
            backends: retain_workspace_symbol_capable(backends),
        }
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

#[async_trait]
impl BackendSupplier for StaticSupplier {
    async fn backends(&self, _scope: Option<&ProjectScope>) -> Result<Vec<Arc<dyn SymbolBackend>>> {
        Ok(self.backends.clone())
    }
}

/// Convert a file path to a file:// URI
pub fn path_to_uri(path: &Path) -> String {
    let path = path.to_string_lossy();
    if path.starts_with("file://") {
        path.into_owned()
    } else if path.starts_with('/') {
        format!("file://{}", path)
    } else {
        format!("file:///{}", path.replace('\\', "/"))
    }
}
