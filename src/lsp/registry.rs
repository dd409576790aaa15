//! Language server registry
//!
//! Starts the configured language servers for a project on first use and
//! supplies them to symbol queries. Every project gets its own set of
//! servers, rooted at the project directory.

use crate::config::ServerConfig;
use crate::error::{Result, SymbolError};
use crate::lsp::client::LanguageServerClient;
use crate::symbols::backend::{
    retain_workspace_symbol_capable, BackendSupplier, ProjectScope, SymbolBackend,
};
use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Starts one language server for a project
#[async_trait]
pub trait ServerLauncher: Send + Sync {
    async fn launch(
        &self,
        config: &ServerConfig,
        project: &ProjectScope,
    ) -> Result<Arc<dyn SymbolBackend>>;
}

/// Launches servers as child processes speaking LSP over stdio
pub struct ProcessLauncher;

#[async_trait]
impl ServerLauncher for ProcessLauncher {
    async fn launch(
        &self,
        config: &ServerConfig,
        project: &ProjectScope,
    ) -> Result<Arc<dyn SymbolBackend>> {
        let client = LanguageServerClient::spawn(config, project).await?;
        Ok(Arc::new(client))
    }
}

/// Language servers per project
pub struct LanguageServerRegistry {
    projects: DashMap<PathBuf, Vec<Arc<dyn SymbolBackend>>>,
    configs: Vec<ServerConfig>,
    launcher: Arc<dyn ServerLauncher>,
    start_lock: tokio::sync::Mutex<()>,
    startup_timeout: Duration,
}

impl LanguageServerRegistry {
    /// Registry that launches the enabled `configs` as processes
    pub fn new(configs: Vec<ServerConfig>) -> Self {
        Self {
            projects: DashMap::new(),
            configs: configs.into_iter().filter(|c| c.enabled).collect(),
            launcher: Arc::new(ProcessLauncher),
            start_lock: tokio::sync::Mutex::new(()),
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
        }
    }

    pub fn with_launcher(mut self, launcher: Arc<dyn ServerLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn with_startup_timeout(mut self, startup_timeout: Duration) -> Self {
        self.startup_timeout = startup_timeout;
        self
    }

    pub fn configs(&self) -> &[ServerConfig] {
        &self.configs
    }

    /// Attach an already running backend to a project
    pub fn register(&self, project: &ProjectScope, backend: Arc<dyn SymbolBackend>) {
        info!("Registered {} for {}", backend.id(), project.root().display());
        self.projects
            .entry(project_key(project.root()))
            .or_default()
            .push(backend);
    }

    pub fn is_started(&self, project: &ProjectScope) -> bool {
        self.projects.contains_key(&project_key(project.root()))
    }

    /// Start the configured servers for a project unless already started.
    ///
    /// Projects are keyed by their canonical root, so two spellings of the
    /// same directory share one set of servers. A server that fails to
    /// start is logged and left out; the project still counts as started.
    pub async fn start_for_project(
        &self,
        project: &ProjectScope,
    ) -> Result<Vec<Arc<dyn SymbolBackend>>> {
        let root = project.root().canonicalize().map_err(|e| {
            SymbolError::BackendList(format!("{}: {}", project.root().display(), e))
        })?;
        if !root.is_dir() {
            return Err(SymbolError::BackendList(format!(
                "{} is not a directory",
                root.display()
            )));
        }

        let _guard = self.start_lock.lock().await;
        if let Some(backends) = self.projects.get(&root) {
            return Ok(backends.value().clone());
        }

        let canonical = ProjectScope::new(root.clone());
        let project = &canonical;

        info!(
            "Starting {} language servers for {}",
            self.configs.len(),
            project.root().display()
        );

        let launches = self.configs.iter().map(|config| async move {
            match timeout(self.startup_timeout, self.launcher.launch(config, project)).await {
                Ok(Ok(backend)) => Some(backend),
                Ok(Err(e)) => {
                    warn!("Failed to start {}: {}", config.name, e);
                    None
                }
                Err(_) => {
                    warn!(
                        "{} did not start within {}ms",
                        config.name,
                        self.startup_timeout.as_millis()
                    );
                    None
                }
            }
        });

        let backends: Vec<_> = join_all(launches).await.into_iter().flatten().collect();

        info!(
            "{} of {} language servers running for {}",
            backends.len(),
            self.configs.len(),
            project.root().display()
        );

        self.projects.insert(root, backends.clone());
        Ok(backends)
    }

    /// Backends running for a project, without starting anything
    pub fn backends_for(&self, project: &ProjectScope) -> Vec<Arc<dyn SymbolBackend>> {
        self.projects
            .get(&project_key(project.root()))
            .map(|backends| backends.value().clone())
            .unwrap_or_default()
    }

    /// Every backend running for any project
    pub fn active_backends(&self) -> Vec<Arc<dyn SymbolBackend>> {
        self.projects
            .iter()
            .flat_map(|entry| entry.value().clone())
            .collect()
    }

    /// Shut down a project's servers. Returns how many were running.
    pub async fn stop_project(&self, project: &ProjectScope) -> usize {
        let Some((_, backends)) = self.projects.remove(&project_key(project.root())) else {
            return 0;
        };
        shutdown_all(&backends).await;
        backends.len()
    }

    pub async fn stop_all(&self) {
        let roots: Vec<PathBuf> = self.projects.iter().map(|e| e.key().clone()).collect();
        for root in roots {
            if let Some((_, backends)) = self.projects.remove(&root) {
                shutdown_all(&backends).await;
            }
        }
    }

    pub fn project_count(&self) -> usize {
        self.projects.len()
    }
}

/// Canonical form of a project root, or the root as given when it cannot
/// be resolved
fn project_key(root: &Path) -> PathBuf {
    root.canonicalize().unwrap_or_else(|_| root.to_path_buf())
}

async fn shutdown_all(backends: &[Arc<dyn SymbolBackend>]) {
    let results = join_all(backends.iter().map(|b| b.shutdown())).await;
    for (backend, result) in backends.iter().zip(results) {
        if let Err(e) = result {
            warn!("Failed to stop {}: {}", backend.id(), e);
        }
    }
}

#[async_trait]
impl BackendSupplier for LanguageServerRegistry {
    async fn backends(&self, scope: Option<&ProjectScope>) -> Result<Vec<Arc<dyn SymbolBackend>>> {
        let backends = match scope {
            Some(project) => self.start_for_project(project).await?,
            None => self.active_backends(),
        };
        Ok(retain_workspace_symbol_capable(backends))
    }
}
