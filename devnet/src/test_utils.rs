//! In-memory container runtime and local endpoints for tests.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap, VecDeque},
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};
use tokio_tungstenite::tungstenite::Message;

use crate::{
    containers::ContainerRole,
    error::RuntimeError,
    runtime::{
        BindMount, ContainerRuntime, ContainerSpec, ContainerState, ExecOutput, RunningContainer,
        WaitTarget,
    },
};

/// Host port assigned to exposed ports a container template does not map.
const DEFAULT_PORT_OFFSET: u16 = 20000;

/// Scripted container.
#[derive(Debug, Clone)]
pub struct MockContainer {
    name: String,
    role: ContainerRole,
    logs: Vec<u8>,
    log_errors_after: Option<(usize, RuntimeError)>,
    log_reads: Arc<AtomicUsize>,
    state: ContainerState,
    ports: BTreeMap<u16, u16>,
    exec_exit_code: i64,
    terminated: Arc<AtomicBool>,
}

impl MockContainer {
    /// A running container with no logs and no mapped ports.
    pub fn new(name: impl Into<String>, role: ContainerRole) -> Self {
        Self {
            name: name.into(),
            role,
            logs: Vec::new(),
            log_errors_after: None,
            log_reads: Arc::default(),
            state: ContainerState::RUNNING,
            ports: BTreeMap::new(),
            exec_exit_code: 0,
            terminated: Arc::default(),
        }
    }

    /// Template the runtime instantiates for every start of `role`.
    pub fn template(role: ContainerRole) -> Self {
        Self::new(String::new(), role)
    }

    /// Sets the log output.
    pub fn with_logs(mut self, logs: &str) -> Self {
        self.logs = logs.as_bytes().to_vec();
        self
    }

    /// Fails every log read after the first `reads` with `err`.
    pub fn with_log_errors_after(mut self, reads: usize, err: RuntimeError) -> Self {
        self.log_errors_after = Some((reads, err));
        self
    }

    /// Sets the reported state.
    pub const fn with_state(mut self, state: ContainerState) -> Self {
        self.state = state;
        self
    }

    /// Maps a container port to a host port.
    pub fn with_port(mut self, container_port: u16, host_port: u16) -> Self {
        self.ports.insert(container_port, host_port);
        self
    }

    /// Sets the exit code of every exec.
    pub const fn with_exec_exit_code(mut self, code: i64) -> Self {
        self.exec_exit_code = code;
        self
    }

    /// Whether [`RunningContainer::terminate`] was called.
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    fn instantiate(&self, spec: &ContainerSpec) -> Self {
        let mut container = self.clone();
        container.name = spec.name().to_string();
        container.role = spec.role();
        container.log_reads = Arc::default();
        container.terminated = Arc::default();
        for port in spec.ports() {
            container.ports.entry(*port).or_insert_with(|| port.saturating_add(DEFAULT_PORT_OFFSET));
        }
        container
    }
}

#[async_trait]
impl WaitTarget for MockContainer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn state(&self) -> Result<ContainerState, RuntimeError> {
        if self.is_terminated() {
            return Ok(ContainerState::exited(137));
        }
        Ok(self.state)
    }

    async fn logs(&self) -> Result<Vec<u8>, RuntimeError> {
        let reads = self.log_reads.fetch_add(1, Ordering::SeqCst);
        match &self.log_errors_after {
            Some((limit, err)) if reads >= *limit => Err(err.clone()),
            _ => Ok(self.logs.clone()),
        }
    }

    async fn host(&self) -> Result<String, RuntimeError> {
        Ok("127.0.0.1".to_string())
    }

    async fn host_port(&self, port: u16) -> Result<u16, RuntimeError> {
        self.ports
            .get(&port)
            .copied()
            .ok_or_else(|| RuntimeError::new(format!("port {port} of {} is not mapped", self.name)))
    }

    async fn exec(&self, _cmd: Vec<String>) -> Result<ExecOutput, RuntimeError> {
        Ok(ExecOutput { exit_code: Some(self.exec_exit_code), stdout: Vec::new() })
    }
}

#[async_trait]
impl RunningContainer for MockContainer {
    fn id(&self) -> &str {
        &self.name
    }

    async fn terminate(&self) -> Result<(), RuntimeError> {
        self.terminated.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// What the runtime was asked to start.
#[derive(Debug, Clone)]
pub struct StartRecord {
    /// Container name.
    pub name: String,
    /// Container role.
    pub role: ContainerRole,
    /// Image in `name:tag` form.
    pub image: String,
    /// Forced platform.
    pub platform: Option<String>,
    /// Whether reuse was allowed.
    pub reuse: bool,
    /// Entrypoint override.
    pub entrypoint: Option<String>,
    /// Command.
    pub cmd: Vec<String>,
    /// Environment.
    pub env: BTreeMap<String, String>,
    /// Bind mounts.
    pub mounts: Vec<BindMount>,
    /// Paths of copied files.
    pub files: Vec<String>,
    /// Networks.
    pub networks: Vec<String>,
}

impl StartRecord {
    fn new(spec: &ContainerSpec) -> Self {
        Self {
            name: spec.name().to_string(),
            role: spec.role(),
            image: spec.image().to_string(),
            platform: spec.platform().map(str::to_string),
            reuse: spec.reuse(),
            entrypoint: spec.entrypoint().map(str::to_string),
            cmd: spec.cmd().to_vec(),
            env: spec.env().clone(),
            mounts: spec.mounts().to_vec(),
            files: spec.files().iter().map(|file| file.path.clone()).collect(),
            networks: spec.networks().to_vec(),
        }
    }

    /// The command joined with spaces.
    pub fn command_line(&self) -> String {
        self.cmd.join(" ")
    }
}

#[derive(Debug, Default)]
struct State {
    starts: Vec<StartRecord>,
    removed: Vec<String>,
    networks: BTreeSet<String>,
    removed_networks: Vec<String>,
    always_fail: HashMap<ContainerRole, RuntimeError>,
    fail_next: HashMap<ContainerRole, VecDeque<RuntimeError>>,
    templates: HashMap<ContainerRole, MockContainer>,
    running: BTreeMap<String, Arc<MockContainer>>,
}

/// Container runtime that records requests and hands out [`MockContainer`]s.
///
/// Setup roles default to containers that exited with code 0. A start with
/// reuse enabled returns the live container of the same name, if any.
#[derive(Debug, Default)]
pub struct MockRuntime {
    state: Mutex<State>,
}

impl MockRuntime {
    /// Creates an empty runtime.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fails every start of `role` with `err`.
    pub fn always_fail_starts(&self, role: ContainerRole, err: RuntimeError) {
        self.lock().always_fail.insert(role, err);
    }

    /// Fails the next starts of `role` with `errors`, in order.
    pub fn fail_next_starts(&self, role: ContainerRole, errors: Vec<RuntimeError>) {
        self.lock().fail_next.entry(role).or_default().extend(errors);
    }

    /// Uses `template` for every later start of `role`.
    pub fn set_container(&self, role: ContainerRole, template: MockContainer) {
        self.lock().templates.insert(role, template);
    }

    /// Number of start requests.
    pub fn start_count(&self) -> usize {
        self.lock().starts.len()
    }

    /// All start requests, in order.
    pub fn starts(&self) -> Vec<StartRecord> {
        self.lock().starts.clone()
    }

    /// Start requests for `role`.
    pub fn starts_of(&self, role: ContainerRole) -> Vec<StartRecord> {
        self.lock().starts.iter().filter(|start| start.role == role).cloned().collect()
    }

    /// Names passed to [`ContainerRuntime::remove`], in order.
    pub fn removed(&self) -> Vec<String> {
        self.lock().removed.clone()
    }

    /// Networks that currently exist.
    pub fn networks(&self) -> Vec<String> {
        self.lock().networks.iter().cloned().collect()
    }

    /// Networks passed to [`ContainerRuntime::remove_network`].
    pub fn removed_networks(&self) -> Vec<String> {
        self.lock().removed_networks.clone()
    }

    /// The live container named `name`.
    pub fn container(&self, name: &str) -> Option<Arc<MockContainer>> {
        self.lock().running.get(name).cloned()
    }
}

#[async_trait]
impl ContainerRuntime for MockRuntime {
    async fn create_network(&self, name: &str) -> Result<(), RuntimeError> {
        self.lock().networks.insert(name.to_string());
        Ok(())
    }

    async fn remove_network(&self, name: &str) -> Result<(), RuntimeError> {
        let mut state = self.lock();
        state.networks.remove(name);
        state.removed_networks.push(name.to_string());
        Ok(())
    }

    async fn start(&self, spec: &ContainerSpec) -> Result<Arc<dyn RunningContainer>, RuntimeError> {
        let mut state = self.lock();
        state.starts.push(StartRecord::new(spec));

        if let Some(err) = state.always_fail.get(&spec.role()) {
            return Err(err.clone());
        }
        if let Some(err) = state.fail_next.get_mut(&spec.role()).and_then(VecDeque::pop_front) {
            return Err(err);
        }

        if spec.reuse()
            && let Some(existing) = state.running.get(spec.name())
            && !existing.is_terminated()
        {
            return Ok(existing.clone());
        }

        let template = state.templates.get(&spec.role()).cloned().unwrap_or_else(|| {
            let template = MockContainer::template(spec.role());
            if spec.role().is_ephemeral() {
                template.with_state(ContainerState::exited(0))
            } else {
                template
            }
        });
        let container = Arc::new(template.instantiate(spec));
        state.running.insert(spec.name().to_string(), container.clone());
        Ok(container)
    }

    async fn remove(&self, name: &str) -> Result<(), RuntimeError> {
        let mut state = self.lock();
        state.removed.push(name.to_string());
        if let Some(container) = state.running.remove(name) {
            container.terminated.store(true, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Serves `200 OK` with a JSON-RPC result to every HTTP request. Returns the port.
pub async fn serve_http() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind http listener");
    let port = listener.local_addr().expect("listener address").port();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(answer_http(stream));
        }
    });
    port
}

async fn answer_http(mut stream: TcpStream) {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        let Ok(read) = stream.read(&mut buf).await else { return };
        if read == 0 {
            return;
        }
        request.extend_from_slice(&buf[..read]);
        let Some(header_end) = request.windows(4).position(|window| window == b"\r\n\r\n") else {
            continue;
        };
        let headers = String::from_utf8_lossy(&request[..header_end]).to_ascii_lowercase();
        let body_len = headers
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|len| len.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if request.len() >= header_end + 4 + body_len {
            break;
        }
    }

    let body = r#"{"jsonrpc":"2.0","id":1,"result":"0x539"}"#;
    let response = format!(
        "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

/// Accepts WebSocket handshakes and holds connections until closed. Returns the port.
pub async fn serve_ws() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind ws listener");
    let port = listener.local_addr().expect("listener address").port();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Ok(mut socket) = tokio_tungstenite::accept_async(stream).await else { return };
                while let Some(Ok(message)) = socket.next().await {
                    if matches!(message, Message::Close(_)) {
                        break;
                    }
                }
            });
        }
    });
    port
}

