//! The Http service object: endpoint, host and connection registries,
//! the explicit default-host handle, and the housekeeping timer.
//!
//! Everything the original expressed as process-wide singletons hangs off
//! one `Http` value here, so tests instantiate isolated services.

use crate::endpoint::{drive_connection, Endpoint};
use crate::host::Host;
use kiln_http::ConnState;
use parking_lot::{Mutex, RwLock};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tracing::{debug, info};

/// Connection progress published to waiters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnStatus {
    /// Current lifecycle state.
    pub state: ConnState,
    /// Requests completed so far on the connection.
    pub completed: u64,
}

impl Default for ConnStatus {
    fn default() -> Self {
        Self {
            state: ConnState::Begin,
            completed: 0,
        }
    }
}

struct Registered {
    id: u64,
    endpoint: Arc<Endpoint>,
    status: watch::Receiver<ConnStatus>,
    last_activity: Instant,
    task: Option<tokio::task::JoinHandle<()>>,
}

/// Service-wide registries and the housekeeping timer.
pub struct Http {
    endpoints: Mutex<Vec<Arc<Endpoint>>>,
    hosts: Mutex<Vec<Arc<RwLock<Host>>>>,
    default_host: Mutex<Option<Arc<RwLock<Host>>>>,
    connections: Mutex<Vec<Registered>>,
    next_conn_id: AtomicU64,
    housekeeper: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Default for Http {
    fn default() -> Self {
        Self::new()
    }
}

impl Http {
    /// Creates an isolated service.
    #[must_use]
    pub fn new() -> Self {
        Self {
            endpoints: Mutex::new(Vec::new()),
            hosts: Mutex::new(Vec::new()),
            default_host: Mutex::new(None),
            connections: Mutex::new(Vec::new()),
            next_conn_id: AtomicU64::new(1),
            housekeeper: Mutex::new(None),
        }
    }

    // ------------------------------------------------------------------
    // Endpoint registry
    // ------------------------------------------------------------------

    /// Registers an endpoint.
    pub fn add_endpoint(&self, endpoint: Arc<Endpoint>) {
        self.endpoints.lock().push(endpoint);
    }

    /// Removes an endpoint from the registry.
    pub fn remove_endpoint(&self, endpoint: &Arc<Endpoint>) {
        self.endpoints
            .lock()
            .retain(|e| !Arc::ptr_eq(e, endpoint));
    }

    /// Finds the endpoint bound to `(ip, port)`. An endpoint bound to all
    /// interfaces matches any ip.
    #[must_use]
    pub fn lookup_endpoint(&self, ip: &str, port: u16) -> Option<Arc<Endpoint>> {
        self.endpoints
            .lock()
            .iter()
            .find(|e| e.port() == port && (e.ip().is_empty() || e.ip() == ip))
            .cloned()
    }

    /// Enables named virtual hosting on every endpoint matching `ip` and
    /// `port`; empty ip or zero port act as wildcards. Returns the number
    /// of endpoints flagged.
    pub fn configure_named_virtual_endpoints(&self, ip: &str, port: u16) -> usize {
        let mut count = 0;
        for endpoint in self.endpoints.lock().iter() {
            if (port == 0 || endpoint.port() == 0 || endpoint.port() == port)
                && (ip.is_empty() || endpoint.ip().is_empty() || endpoint.ip() == ip)
            {
                endpoint.set_named_virtual_hosts(true);
                count += 1;
            }
        }
        count
    }

    /// Flags every endpoint matching `name` (`ip`, `ip:port` or `:port`)
    /// as TLS-terminated. Returns the number of endpoints flagged.
    pub fn secure_endpoints_by_name(&self, name: &str) -> usize {
        let (ip, port) = match name.rsplit_once(':') {
            Some((ip, port)) => (ip, port.parse::<u16>().unwrap_or(0)),
            None => (name, 0),
        };
        let mut count = 0;
        for endpoint in self.endpoints.lock().iter() {
            if (port == 0 || endpoint.port() == 0 || endpoint.port() == port)
                && (ip.is_empty() || endpoint.ip().is_empty() || endpoint.ip() == ip)
            {
                endpoint.set_secure(true);
                count += 1;
            }
        }
        count
    }

    /// Starts an endpoint: binds its socket and begins accepting.
    ///
    /// # Errors
    ///
    /// Propagates bind and validation failures.
    pub async fn start_endpoint(
        self: &Arc<Self>,
        endpoint: &Arc<Endpoint>,
    ) -> std::io::Result<SocketAddr> {
        endpoint.start(self).await
    }

    /// Stops an endpoint and tears down every connection dispatched
    /// through it.
    pub fn stop_endpoint(&self, endpoint: &Arc<Endpoint>) {
        endpoint.stop();
        let mut connections = self.connections.lock();
        connections.retain_mut(|entry| {
            if Arc::ptr_eq(&entry.endpoint, endpoint) {
                if let Some(task) = entry.task.take() {
                    task.abort();
                }
                debug!(id = entry.id, "tore down connection with endpoint");
                false
            } else {
                true
            }
        });
    }

    // ------------------------------------------------------------------
    // Host registry and the default host
    // ------------------------------------------------------------------

    /// Registers a host.
    pub fn add_host(&self, host: Arc<RwLock<Host>>) {
        self.hosts.lock().push(host);
    }

    /// Removes a host from the registry.
    pub fn remove_host(&self, host: &Arc<RwLock<Host>>) {
        self.hosts.lock().retain(|h| !Arc::ptr_eq(h, host));
    }

    /// Sets the service's default host.
    pub fn set_default_host(&self, host: Arc<RwLock<Host>>) {
        *self.default_host.lock() = Some(host);
    }

    /// The service's default host.
    #[must_use]
    pub fn default_host(&self) -> Option<Arc<RwLock<Host>>> {
        self.default_host.lock().clone()
    }

    // ------------------------------------------------------------------
    // Connection registry
    // ------------------------------------------------------------------

    /// Hands an accepted socket to a fresh per-connection task and
    /// registers it for housekeeping and teardown.
    pub(crate) fn spawn_connection(
        self: &Arc<Self>,
        endpoint: Arc<Endpoint>,
        stream: TcpStream,
        peer: SocketAddr,
    ) {
        let id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        let (status_tx, status_rx) = watch::channel(ConnStatus::default());

        // Register before spawning so the driver's own unregister cannot
        // race ahead of the insert.
        self.connections.lock().push(Registered {
            id,
            endpoint: Arc::clone(&endpoint),
            status: status_rx,
            last_activity: Instant::now(),
            task: None,
        });

        let service = Arc::clone(self);
        let task = tokio::spawn(async move {
            drive_connection(service, endpoint, stream, peer, Some((id, status_tx))).await;
        });
        if let Some(entry) = self.connections.lock().iter_mut().find(|e| e.id == id) {
            entry.task = Some(task);
        }
    }

    pub(crate) fn touch_connection(&self, id: u64) {
        if let Some(entry) = self.connections.lock().iter_mut().find(|e| e.id == id) {
            entry.last_activity = Instant::now();
        }
    }

    pub(crate) fn unregister_connection(&self, id: u64) {
        self.connections.lock().retain(|e| e.id != id);
    }

    /// Number of live registered connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Status watcher for a registered connection, for wait glue.
    #[must_use]
    pub fn watch_connection(&self, id: u64) -> Option<watch::Receiver<ConnStatus>> {
        self.connections
            .lock()
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.status.clone())
    }

    /// Identifiers of live connections, oldest first.
    #[must_use]
    pub fn connection_ids(&self) -> Vec<u64> {
        self.connections.lock().iter().map(|e| e.id).collect()
    }

    // ------------------------------------------------------------------
    // Housekeeping
    // ------------------------------------------------------------------

    /// Starts the periodic housekeeper once, ticking at `period` — the
    /// `timer_period` of the first endpoint started on this service.
    /// Accept paths align their wakeups to this tick; it also reaps
    /// connections idle past their endpoint's inactivity timeout.
    pub(crate) fn start_housekeeper(self: &Arc<Self>, period: Duration) {
        let mut slot = self.housekeeper.lock();
        if slot.is_some() {
            return;
        }
        let service = Arc::clone(self);
        *slot = Some(tokio::spawn(async move {
            let mut tick = tokio::time::interval(period);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tick.tick().await;
                service.reap_idle();
            }
        }));
    }

    fn reap_idle(&self) {
        let now = Instant::now();
        let mut connections = self.connections.lock();
        connections.retain_mut(|entry| {
            let timeout = entry.endpoint.limits().inactivity_timeout;
            if now.duration_since(entry.last_activity) > timeout {
                if let Some(task) = entry.task.take() {
                    task.abort();
                }
                info!(id = entry.id, "reaped idle connection");
                false
            } else {
                true
            }
        });
    }
}

impl Drop for Http {
    fn drop(&mut self) {
        if let Some(task) = self.housekeeper.lock().take() {
            task.abort();
        }
    }
}

/// Builds an endpoint with one host and one default route, registered on
/// the service. The convenience mirror of a config-file-free setup.
pub fn configured_endpoint(
    service: &Arc<Http>,
    ip: &str,
    port: u16,
    route: crate::route::Route,
) -> Arc<Endpoint> {
    let mut host = Host::new();
    host.set_default_route(route.clone());
    host.add_route(route);
    host.set_ip_addr(ip, i32::from(port));
    let host = Arc::new(RwLock::new(host));

    let endpoint = Endpoint::new(ip, port);
    endpoint.add_host(Arc::clone(&host));
    service.add_host(Arc::clone(&host));
    if service.default_host().is_none() {
        service.set_default_host(host);
    }
    service.add_endpoint(Arc::clone(&endpoint));
    endpoint
}
