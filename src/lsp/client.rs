//! LSP JSON-RPC client
//!
//! Talks to one language server over its stdin/stdout. A writer task drains
//! an outgoing queue, a reader task routes responses back to the request
//! that is waiting for them.

use crate::config::ServerConfig;
use crate::error::{Result, SymbolError};
use crate::lsp::capabilities::ServerCapabilities;
use crate::lsp::transport::{read_message, write_message};
use crate::symbols::backend::{BackendCapabilities, ProjectScope, SymbolBackend};
use crate::symbols::models::{BackendId, Location, QueryRequest, SymbolRecord};
use crate::symbols::wire::{RawBackendResult, WorkspaceSymbol, WorkspaceSymbolLocation};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use std::process::Stdio;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

/// JSON-RPC request ID type
pub type RequestId = i64;

type PendingMap = DashMap<RequestId, oneshot::Sender<Result<Value>>>;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// LSP client for one language server
pub struct LanguageServerClient {
    id: BackendId,
    /// Server capabilities after initialization
    capabilities: RwLock<ServerCapabilities>,
    next_id: AtomicI64,
    outgoing: mpsc::UnboundedSender<Value>,
    pending: Arc<PendingMap>,
    process: tokio::sync::Mutex<Option<Child>>,
    writer_task: Mutex<Option<JoinHandle<()>>>,
    io_tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl LanguageServerClient {
    /// Spawn and initialize a language server for a project
    pub async fn spawn(config: &ServerConfig, project: &ProjectScope) -> Result<Self> {
        let mut process = Command::new(&config.command)
            .args(&config.args)
            .current_dir(project.root())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SymbolError::Spawn(format!("{}: {}", config.command, e)))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| SymbolError::Spawn("Failed to open stdin".to_string()))?;
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| SymbolError::Spawn("Failed to open stdout".to_string()))?;
        let stderr = process.stderr.take();

        let id = BackendId::new(format!("{}@{}", config.name, project.name()));
        let client = Self::connect(id, BufReader::new(stdout), stdin);

        if let Some(stderr) = stderr {
            let server = client.id.clone();
            client.io_tasks.lock().push(tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("[{}] {}", server, line);
                }
            }));
        }

        *client.process.lock().await = Some(process);

        client.initialize(project).await?;
        info!("{} initialized", client.id);

        Ok(client)
    }

    /// Attach to an already connected transport
    pub fn connect<R, W>(id: BackendId, reader: R, writer: W) -> Self
    where
        R: AsyncBufRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (outgoing, queue) = mpsc::unbounded_channel();
        let pending: Arc<PendingMap> = Arc::new(DashMap::new());

        let writer_task = tokio::spawn(write_loop(writer, queue, id.clone()));
        let reader_task = tokio::spawn(read_loop(
            reader,
            Arc::clone(&pending),
            outgoing.clone(),
            id.clone(),
        ));

        Self {
            id,
            capabilities: RwLock::new(ServerCapabilities::default()),
            next_id: AtomicI64::new(1),
            outgoing,
            pending,
            process: tokio::sync::Mutex::new(None),
            writer_task: Mutex::new(Some(writer_task)),
            io_tasks: Mutex::new(vec![reader_task]),
        }
    }

    /// Initialize the LSP server (must be called before any other requests)
    pub async fn initialize(&self, project: &ProjectScope) -> Result<()> {
        let root_uri = project.root_uri();
        let value_set: Vec<u32> = (1..=26).collect();
        let params = json!({
            "processId": std::process::id(),
            "rootUri": root_uri,
            "capabilities": {
                "workspace": {
                    "workspaceFolders": true,
                    "symbol": {
                        "dynamicRegistration": false,
                        "symbolKind": { "valueSet": value_set },
                        "tagSupport": { "valueSet": [1] },
                        "resolveSupport": { "properties": ["location.range"] }
                    }
                }
            },
            "workspaceFolders": [{
                "uri": root_uri,
                "name": project.name()
            }]
        });

        let response = self.request("initialize", params).await?;
        *self.capabilities.write() = ServerCapabilities::from_initialize_result(&response);

        self.notify("initialized", json!({}))?;

        Ok(())
    }

    pub fn id(&self) -> &BackendId {
        &self.id
    }

    pub fn server_capabilities(&self) -> ServerCapabilities {
        self.capabilities.read().clone()
    }

    /// Send a request and wait for its response.
    ///
    /// Dropping the returned future before the response arrives withdraws
    /// the request and sends `$/cancelRequest`.
    pub async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);

        let mut guard = PendingRequest {
            id,
            pending: Arc::clone(&self.pending),
            outgoing: self.outgoing.clone(),
            settled: false,
        };

        self.outgoing
            .send(json!({
                "jsonrpc": "2.0",
                "id": id,
                "method": method,
                "params": params
            }))
            .map_err(|_| SymbolError::ServerShutdown)?;

        trace!("{} -> {} (#{})", self.id, method, id);

        let response = rx.await;
        guard.settled = true;
        response.map_err(|_| SymbolError::ServerShutdown)?
    }

    /// Send a notification (no response expected)
    pub fn notify(&self, method: &str, params: Value) -> Result<()> {
        self.outgoing
            .send(json!({
                "jsonrpc": "2.0",
                "method": method,
                "params": params
            }))
            .map_err(|_| SymbolError::ServerShutdown)
    }

    /// Number of requests still waiting for a response
    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    /// Shutdown the server gracefully
    pub async fn shutdown_server(&self) -> Result<()> {
        if let Err(e) = timeout(SHUTDOWN_GRACE, self.request("shutdown", Value::Null)).await {
            debug!("{} did not acknowledge shutdown: {}", self.id, e);
        }
        let _ = self.notify("exit", Value::Null);

        // The writer stops after flushing `exit`
        let writer = self.writer_task.lock().take();
        if let Some(mut writer) = writer {
            if timeout(SHUTDOWN_GRACE, &mut writer).await.is_err() {
                debug!("{} writer did not drain", self.id);
                writer.abort();
            }
        }

        if let Some(mut process) = self.process.lock().await.take() {
            if timeout(SHUTDOWN_GRACE, process.wait()).await.is_err() {
                warn!("{} did not exit, killing it", self.id);
                process.kill().await?;
            }
        }

        for task in self.io_tasks.lock().drain(..) {
            task.abort();
        }
        self.pending.clear();

        info!("{} stopped", self.id);
        Ok(())
    }
}

#[async_trait]
impl SymbolBackend for LanguageServerClient {
    fn id(&self) -> &BackendId {
        &self.id
    }

    fn capabilities(&self) -> BackendCapabilities {
        self.capabilities.read().backend_capabilities()
    }

    async fn workspace_symbols(&self, request: &QueryRequest) -> Result<RawBackendResult> {
        let response = self
            .request("workspace/symbol", json!({ "query": request.query }))
            .await?;
        RawBackendResult::from_response(response)
    }

    async fn resolve_symbol(&self, record: &SymbolRecord) -> Result<Option<Location>> {
        let Some(deferred) = record.deferred() else {
            return Ok(record.location().cloned());
        };

        if !self.capabilities().workspace_symbol_resolve {
            return Err(SymbolError::Unsupported(format!(
                "{} does not resolve workspace symbols",
                self.id
            )));
        }

        let mut params = json!({
            "name": record.name(),
            "kind": u32::from(record.kind()),
            "location": { "uri": deferred.uri },
        });
        if let Some(container) = record.container_name() {
            params["containerName"] = json!(container);
        }
        if let Some(data) = &deferred.data {
            params["data"] = data.clone();
        }

        let response = self.request("workspaceSymbol/resolve", params).await?;
        let resolved: WorkspaceSymbol = serde_json::from_value(response)
            .map_err(|e| SymbolError::MalformedResponse(e.to_string()))?;

        Ok(match resolved.location {
            WorkspaceSymbolLocation::Full(location) => Some(location),
            WorkspaceSymbolLocation::UriOnly { .. } => None,
        })
    }

    async fn shutdown(&self) -> Result<()> {
        self.shutdown_server().await
    }
}

impl Drop for LanguageServerClient {
    fn drop(&mut self) {
        if let Some(writer) = self.writer_task.lock().take() {
            writer.abort();
        }
        for task in self.io_tasks.lock().drain(..) {
            task.abort();
        }
    }
}

/// Withdraws a request whose caller stopped waiting
struct PendingRequest {
    id: RequestId,
    pending: Arc<PendingMap>,
    outgoing: mpsc::UnboundedSender<Value>,
    settled: bool,
}

impl Drop for PendingRequest {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if self.pending.remove(&self.id).is_some() {
            debug!("Cancelling request #{}", self.id);
            let _ = self.outgoing.send(json!({
                "jsonrpc": "2.0",
                "method": "$/cancelRequest",
                "params": { "id": self.id }
            }));
        }
    }
}

async fn write_loop<W>(mut writer: W, mut queue: mpsc::UnboundedReceiver<Value>, server: BackendId)
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = queue.recv().await {
        if let Err(e) = write_message(&mut writer, &message).await {
            warn!("Failed to write to {}: {}", server, e);
            break;
        }
        if message.get("method").and_then(Value::as_str) == Some("exit") {
            break;
        }
    }
}

async fn read_loop<R>(
    mut reader: R,
    pending: Arc<PendingMap>,
    outgoing: mpsc::UnboundedSender<Value>,
    server: BackendId,
) where
    R: AsyncBufRead + Unpin,
{
    loop {
        match read_message(&mut reader).await {
            Ok(Some(message)) => route_message(message, &pending, &outgoing, &server),
            Ok(None) => {
                debug!("{} closed its output", server);
                break;
            }
            Err(SymbolError::Serialization(e)) => {
                warn!("Discarding unparsable message from {}: {}", server, e);
            }
            Err(e) => {
                warn!("Failed to read from {}: {}", server, e);
                break;
            }
        }
    }

    // Wakes every waiter with ServerShutdown
    pending.clear();
}

fn route_message(
    message: Value,
    pending: &PendingMap,
    outgoing: &mpsc::UnboundedSender<Value>,
    server: &BackendId,
) {
    let method = message.get("method").and_then(Value::as_str);
    let id = message.get("id");

    match (method, id) {
        (Some(method), Some(id)) => {
            // Server-to-client request; we support none of them
            debug!("{} asked for {}, replying with null", server, method);
            let _ = outgoing.send(json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": Value::Null
            }));
        }
        (Some(method), None) => {
            trace!("{} notification: {}", server, method);
        }
        (None, Some(id)) => {
            let Some(id) = id.as_i64() else {
                warn!("{} sent a response with a non-numeric id: {}", server, id);
                return;
            };
            let Some((_, waiter)) = pending.remove(&id) else {
                debug!("Discarding late response #{} from {}", id, server);
                return;
            };

            let result = match message.get("error") {
                Some(error) => Err(SymbolError::Rpc {
                    code: error.get("code").and_then(Value::as_i64).unwrap_or(-1),
                    message: error
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("Unknown error")
                        .to_string(),
                }),
                None => Ok(message.get("result").cloned().unwrap_or(Value::Null)),
            };
            let _ = waiter.send(result);
        }
        (None, None) => {
            warn!("{} sent a message that is neither request nor response", server);
        }
    }
}
