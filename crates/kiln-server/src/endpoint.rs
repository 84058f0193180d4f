//! Listening endpoints: bind, accept, and per-connection dispatch.
//!
//! The accept loop runs on its own task (the service dispatcher). Each
//! accepted socket is handed to an independent cooperative execution
//! context, one task per connection by default; every state transition,
//! parser invocation and handler call for that connection runs serially
//! there. Nothing is shared with the accept loop beyond the registration
//! handshake.

use crate::host::{host_name_matches, Host};
use crate::service::{ConnStatus, Http};
use kiln_http::error::code;
use kiln_http::{
    Conn, ConnState, HttpError, HttpLimits, Method, Pipeline, PipelineFactory, Rx, Tx,
};
use parking_lot::{Mutex, RwLock};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// How accepted sockets are dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    /// Every connection gets a fresh execution context.
    #[default]
    NewDispatcher,
    /// Connections run inline on the accept loop's context, serialized.
    ServiceDispatcher,
}

/// A bound listener with its ordered host list.
pub struct Endpoint {
    ip: String,
    port: AtomicU16,
    hosts: Mutex<Vec<Arc<RwLock<Host>>>>,
    named_virtual_hosts: AtomicBool,
    secure: AtomicBool,
    limits: Mutex<Option<Arc<HttpLimits>>>,
    dispatch: Mutex<DispatchMode>,
    active_requests: AtomicUsize,
    accept_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Endpoint {
    /// Creates an endpoint for `ip:port`. An empty `ip` binds all
    /// interfaces.
    #[must_use]
    pub fn new(ip: impl Into<String>, port: u16) -> Arc<Self> {
        Arc::new(Self {
            ip: ip.into(),
            port: AtomicU16::new(port),
            hosts: Mutex::new(Vec::new()),
            named_virtual_hosts: AtomicBool::new(false),
            secure: AtomicBool::new(false),
            limits: Mutex::new(None),
            dispatch: Mutex::new(DispatchMode::default()),
            active_requests: AtomicUsize::new(0),
            accept_task: Mutex::new(None),
        })
    }

    /// The configured bind address.
    #[must_use]
    pub fn ip(&self) -> &str {
        &self.ip
    }

    /// The bound port; resolved after `start` when configured as 0.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port.load(Ordering::Relaxed)
    }

    /// Marks the endpoint TLS-terminated. The socket wrapper itself is
    /// outside this crate; the flag feeds logging and host selection.
    pub fn set_secure(&self, on: bool) {
        self.secure.store(on, Ordering::Relaxed);
    }

    /// True when TLS-terminated.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.secure.load(Ordering::Relaxed)
    }

    /// Enables or disables `Host`-header based host selection.
    pub fn set_named_virtual_hosts(&self, on: bool) {
        self.named_virtual_hosts.store(on, Ordering::Relaxed);
    }

    /// True when the `Host` header selects among this endpoint's hosts.
    #[must_use]
    pub fn has_named_virtual_hosts(&self) -> bool {
        self.named_virtual_hosts.load(Ordering::Relaxed)
    }

    /// Sets the dispatch mode for accepted connections.
    pub fn set_dispatch_mode(&self, mode: DispatchMode) {
        *self.dispatch.lock() = mode;
    }

    /// Adds a host. The first host's default-route limits become the
    /// endpoint limits.
    pub fn add_host(&self, host: Arc<RwLock<Host>>) {
        let mut limits = self.limits.lock();
        if limits.is_none() {
            if let Some(defaults) = host.read().default_limits() {
                *limits = Some(defaults);
            }
        }
        drop(limits);
        self.hosts.lock().push(host);
    }

    /// Number of hosts attached.
    #[must_use]
    pub fn host_count(&self) -> usize {
        self.hosts.lock().len()
    }

    /// The first host, used when named virtual hosting is off and as the
    /// error-rendering fallback.
    #[must_use]
    pub fn first_host(&self) -> Option<Arc<RwLock<Host>>> {
        self.hosts.lock().first().cloned()
    }

    /// Finds the host serving `name`, per the named-virtual-host rules:
    /// an empty name selects the first host; otherwise the first host
    /// whose name matches exactly (case-insensitive) or by `*` /
    /// `*.suffix` wildcard wins.
    #[must_use]
    pub fn lookup_host(&self, name: &str) -> Option<Arc<RwLock<Host>>> {
        let hosts = self.hosts.lock();
        if name.is_empty() {
            return hosts.first().cloned();
        }
        hosts
            .iter()
            .find(|host| host_name_matches(host.read().name(), name))
            .cloned()
    }

    /// The limits connections on this endpoint snapshot.
    #[must_use]
    pub fn limits(&self) -> Arc<HttpLimits> {
        self.limits
            .lock()
            .clone()
            .unwrap_or_else(|| Arc::new(HttpLimits::default()))
    }

    /// Overrides the endpoint limits.
    pub fn set_limits(&self, limits: HttpLimits) {
        *self.limits.lock() = Some(Arc::new(limits));
    }

    /// Requests currently open on this endpoint.
    #[must_use]
    pub fn active_requests(&self) -> usize {
        self.active_requests.load(Ordering::Relaxed)
    }

    /// Binds the listen socket and spawns the accept loop.
    ///
    /// # Errors
    ///
    /// Fails when no host is attached or the socket cannot bind.
    pub async fn start(self: &Arc<Self>, service: &Arc<Http>) -> io::Result<SocketAddr> {
        if self.hosts.lock().is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "missing host object on endpoint",
            ));
        }
        let bind_ip = if self.ip.is_empty() { "0.0.0.0" } else { &self.ip };
        let listener = TcpListener::bind((bind_ip, self.port())).await?;
        let local = listener.local_addr()?;
        self.port.store(local.port(), Ordering::Relaxed);

        let proto = if self.is_secure() { "HTTPS" } else { "HTTP" };
        let shown_ip = if self.ip.is_empty() { "*" } else { &self.ip };
        info!("started {proto} service on \"{shown_ip}:{}\"", local.port());

        service.start_housekeeper(self.limits().timer_period);
        let endpoint = Arc::clone(self);
        let service = Arc::clone(service);
        let task = tokio::spawn(async move {
            endpoint.accept_loop(service, listener).await;
        });
        *self.accept_task.lock() = Some(task);
        Ok(local)
    }

    /// Stops accepting. Existing connections are torn down by the
    /// service's `stop_endpoint`.
    pub fn stop(&self) {
        if let Some(task) = self.accept_task.lock().take() {
            task.abort();
        }
    }

    async fn accept_loop(self: Arc<Self>, service: Arc<Http>, listener: TcpListener) {
        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(err) if is_fatal_accept_error(&err) => {
                    warn!(%err, "accept failed, stopping endpoint");
                    return;
                }
                Err(err) => {
                    debug!(%err, "accept error");
                    continue;
                }
            };
            let _ = stream.set_nodelay(true);
            debug!(%peer, "accepted connection");

            let mode = *self.dispatch.lock();
            let endpoint = Arc::clone(&self);
            let svc = Arc::clone(&service);
            match mode {
                DispatchMode::NewDispatcher => {
                    service.spawn_connection(endpoint, stream, peer);
                }
                DispatchMode::ServiceDispatcher => {
                    drive_connection(svc, endpoint, stream, peer, None).await;
                }
            }
        }
    }
}

fn is_fatal_accept_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotConnected | io::ErrorKind::InvalidInput
    )
}

/// Runs one connection to completion on the current task.
pub(crate) async fn drive_connection(
    service: Arc<Http>,
    endpoint: Arc<Endpoint>,
    mut stream: TcpStream,
    peer: SocketAddr,
    registration: Option<(u64, watch::Sender<ConnStatus>)>,
) {
    let limits = endpoint.limits();
    let mut conn = Conn::server((*limits).clone());
    conn.set_connected();
    let mut factory = EndpointFactory {
        endpoint: Arc::clone(&endpoint),
        limits,
        opened: false,
    };
    let (conn_id, status_tx) = match registration {
        Some((id, tx)) => (Some(id), Some(tx)),
        None => (None, None),
    };

    let mut buf = vec![0u8; 8 * 1024];
    let mut eof = false;
    loop {
        conn.advance(&mut factory);
        if let Some(tx) = &status_tx {
            let _ = tx.send(ConnStatus {
                state: conn.state(),
                completed: conn.requests_completed(),
            });
        }
        if let Some(id) = conn_id {
            service.touch_connection(id);
        }

        let out = conn.take_output();
        if !out.is_empty() {
            if stream.write_all(&out).await.is_err() {
                break;
            }
            conn.notify_writable();
        }
        if let Some((status, message)) = conn.take_error() {
            debug!(%peer, status, error = %message, "request error");
        }

        if conn.conn_error() || eof {
            break;
        }
        if conn.state() == ConnState::Begin && !conn.keep_alive() {
            break;
        }

        match stream.read(&mut buf).await {
            Ok(0) => {
                conn.input_closed(&mut factory);
                eof = true;
            }
            Ok(n) => conn.feed(&buf[..n]),
            Err(err) => {
                debug!(%peer, %err, "read error");
                break;
            }
        }
    }

    let _ = stream.shutdown().await;
    if let Some(id) = conn_id {
        service.unregister_connection(id);
    }
    debug!(%peer, requests = conn.requests_completed(), "connection closed");
}

/// Pipeline factory dispatching requests through endpoint, host and route.
struct EndpointFactory {
    endpoint: Arc<Endpoint>,
    limits: Arc<HttpLimits>,
    opened: bool,
}

impl Drop for EndpointFactory {
    fn drop(&mut self) {
        // A request cut off mid-flight (socket error, idle reap, endpoint
        // teardown) still holds a concurrency slot; completion never runs
        // for it, so the slot is released here.
        self.request_complete();
    }
}

impl PipelineFactory for EndpointFactory {
    fn validate_open(&mut self) -> bool {
        let max = self.limits.max_requests;
        let active = self.endpoint.active_requests.fetch_add(1, Ordering::SeqCst);
        if max > 0 && active >= max {
            self.endpoint.active_requests.fetch_sub(1, Ordering::SeqCst);
            return false;
        }
        self.opened = true;
        true
    }

    fn create(&mut self, rx: &mut Rx, tx: &mut Tx) -> Result<Box<dyn Pipeline>, HttpError> {
        let host = self.match_host(rx)?;
        let method = rx
            .method
            .ok_or_else(|| HttpError::protocol(code::BAD_REQUEST, "Unknown method"))?;

        let host = host.read();
        if let Some(route) = host.routes().route(method, &rx.path_info) {
            if let Some(handler) = &route.handler {
                tx.handler = Some(handler.name().to_string());
                return Ok(handler.pipeline());
            }
        }
        // A configured error document serves the miss instead of the bare
        // 404 response.
        if let Some(pipeline) = error_document_pipeline(&host, method, code::NOT_FOUND, tx) {
            return Ok(pipeline);
        }
        Err(HttpError::status_error(code::NOT_FOUND, "No route to serve request"))
    }

    fn request_complete(&mut self) {
        if self.opened {
            self.endpoint.active_requests.fetch_sub(1, Ordering::SeqCst);
            self.opened = false;
        }
    }
}

/// Resolves a status code through the host's default-route error documents
/// to a handler route.
fn error_document_pipeline(
    host: &Host,
    method: Method,
    status: u16,
    tx: &mut Tx,
) -> Option<Box<dyn Pipeline>> {
    let url = host.default_route()?.error_document(status)?;
    let route = host.routes().route(method, url)?;
    let handler = route.handler.as_ref()?;
    tx.handler = Some(handler.name().to_string());
    Some(handler.pipeline())
}

impl EndpointFactory {
    fn match_host(&self, rx: &Rx) -> Result<Arc<RwLock<Host>>, HttpError> {
        if !self.endpoint.has_named_virtual_hosts() {
            return self
                .endpoint
                .first_host()
                .ok_or_else(|| HttpError::status_error(code::NOT_FOUND, "No host to serve request"));
        }
        let header = rx.host_header.as_deref().unwrap_or("");
        self.endpoint.lookup_host(header).ok_or_else(|| {
            HttpError::status_error(
                code::NOT_FOUND,
                format!("No host to serve request, searching for {header}"),
            )
        })
    }
}
