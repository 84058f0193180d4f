//! Virtual hosts: a named collection of routes with per-content-type
//! streaming policy.
//!
//! A cloned host shares its parent's route table until the first mutation;
//! the table lives behind an `Arc` and is copied on write.

use crate::route::{Route, RouteTable};
use kiln_http::HttpLimits;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Opaque response-cache handle; caching itself lives outside this crate.
pub type ResponseCache = Arc<dyn Any + Send + Sync>;

/// Host protocol variants.
pub const PROTOCOL_HTTP_10: &str = "HTTP/1.0";
/// Default host protocol.
pub const PROTOCOL_HTTP_11: &str = "HTTP/1.1";

#[derive(Debug, Clone)]
struct StreamPolicy {
    uri_prefix: Option<String>,
    enabled: bool,
}

/// A virtual host: name, route table, streaming policy.
#[derive(Clone)]
pub struct Host {
    name: String,
    ip: String,
    port: i32,
    protocol: &'static str,
    routes: Arc<RouteTable>,
    default_route: Option<Route>,
    streams: HashMap<String, StreamPolicy>,
    response_cache: Option<ResponseCache>,
    vhost: bool,
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("name", &self.name)
            .field("ip", &self.ip)
            .field("port", &self.port)
            .field("protocol", &self.protocol)
            .field("routes", &self.routes.len())
            .field("vhost", &self.vhost)
            .finish()
    }
}

impl Default for Host {
    fn default() -> Self {
        Self::new()
    }
}

impl Host {
    /// Creates a host. Form posts and JSON bodies are buffered rather than
    /// streamed by default.
    #[must_use]
    pub fn new() -> Self {
        let mut host = Self {
            name: String::new(),
            ip: String::new(),
            port: -1,
            protocol: PROTOCOL_HTTP_11,
            routes: Arc::new(RouteTable::new()),
            default_route: None,
            streams: HashMap::new(),
            response_cache: None,
            vhost: false,
        };
        host.set_streaming("application/x-www-form-urlencoded", None, false);
        host.set_streaming("application/json", None, false);
        host
    }

    /// Clones a host for use as a virtual host. Routes, protocol and
    /// streaming policy are shared copy-on-write; name and address are
    /// not carried over.
    #[must_use]
    pub fn clone_from_parent(parent: &Host) -> Self {
        Self {
            name: String::new(),
            ip: String::new(),
            port: -1,
            protocol: parent.protocol,
            routes: Arc::clone(&parent.routes),
            default_route: parent.default_route.clone(),
            streams: parent.streams.clone(),
            response_cache: parent.response_cache.clone(),
            vhost: true,
        }
    }

    /// Attaches an opaque response cache; clones share it.
    pub fn set_response_cache(&mut self, cache: ResponseCache) {
        self.response_cache = Some(cache);
    }

    /// The attached response cache, if any.
    #[must_use]
    pub fn response_cache(&self) -> Option<&ResponseCache> {
        self.response_cache.as_ref()
    }

    /// The host name used for `Host` header matching.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sets the host name (`ip:port` or a `*` wildcard form).
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// True for hosts created by [`Host::clone_from_parent`].
    #[must_use]
    pub fn is_vhost(&self) -> bool {
        self.vhost
    }

    /// The protocol string announced by this host.
    #[must_use]
    pub fn protocol(&self) -> &'static str {
        self.protocol
    }

    /// Restricts the host to `HTTP/1.0` or `HTTP/1.1`.
    pub fn set_protocol(&mut self, protocol: &'static str) {
        self.protocol = protocol;
    }

    /// Sets the host address and derives the name when unset.
    ///
    /// `ip` may carry a `host:port` suffix when `port` is negative, in
    /// which case the colon is split first. An unset name becomes
    /// `ip:port`, `ip`, or `*:port`.
    pub fn set_ip_addr(&mut self, ip: &str, port: i32) {
        let (ip, port) = if port < 0 && ip.contains(':') {
            let (host, p) = ip.split_once(':').expect("checked colon");
            (host, p.parse().unwrap_or(-1))
        } else {
            (ip, port)
        };
        self.ip = ip.to_string();
        self.port = port;
        if self.name.is_empty() {
            self.name = if !ip.is_empty() {
                if port > 0 {
                    format!("{ip}:{port}")
                } else {
                    ip.to_string()
                }
            } else {
                format!("*:{port}")
            };
        }
    }

    /// The configured bind address.
    #[must_use]
    pub fn ip(&self) -> &str {
        &self.ip
    }

    /// The configured port, `-1` when unset.
    #[must_use]
    pub fn port(&self) -> i32 {
        self.port
    }

    /// The host's route table.
    #[must_use]
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Adds a route. A host sharing its parent's routes clones the table
    /// first.
    pub fn add_route(&mut self, route: Route) {
        Arc::make_mut(&mut self.routes).add(route);
    }

    /// Drops every route.
    pub fn reset_routes(&mut self) {
        self.routes = Arc::new(RouteTable::new());
    }

    /// The terminal route used for endpoint limit defaults and error
    /// rendering.
    #[must_use]
    pub fn default_route(&self) -> Option<&Route> {
        self.default_route.as_ref()
    }

    /// Sets the default route.
    pub fn set_default_route(&mut self, route: Route) {
        self.default_route = Some(route);
    }

    /// Limits carried by the default route, if any.
    #[must_use]
    pub fn default_limits(&self) -> Option<Arc<HttpLimits>> {
        self.default_route.as_ref().and_then(|r| r.limits.clone())
    }

    /// Records whether bodies of `mime` (optionally under `uri_prefix`)
    /// stream to handlers or buffer whole.
    pub fn set_streaming(&mut self, mime: &str, uri_prefix: Option<&str>, enabled: bool) {
        self.streams.insert(
            mime.to_string(),
            StreamPolicy {
                uri_prefix: uri_prefix.map(str::to_string),
                enabled,
            },
        );
    }

    /// Looks up the streaming policy for a received content type. Any
    /// `;` parameters are stripped before comparison; unknown types
    /// stream.
    #[must_use]
    pub fn streaming(&self, mime: &str, uri: &str) -> bool {
        let mime = mime.split(';').next().unwrap_or("").trim();
        if let Some(policy) = self.streams.get(mime) {
            let applies = policy
                .uri_prefix
                .as_ref()
                .map_or(true, |prefix| uri.starts_with(prefix.as_str()));
            if applies {
                return policy.enabled;
            }
        }
        true
    }

    /// Logs the route table through `tracing`.
    pub fn log_routes(&self) {
        info!(host = %self.name, "routes:");
        for (i, route) in self.routes.routes().iter().enumerate() {
            info!(
                "{:>2}. {:<20} methods={:#x} pattern={:<24} target={} next_group={}",
                i, route.name, route.methods, route.pattern, route.target, route.next_group
            );
        }
    }
}

/// True if `name` matches the host header `header`, honoring `*` and
/// `*.suffix` wildcards.
#[must_use]
pub fn host_name_matches(name: &str, header: &str) -> bool {
    if name.eq_ignore_ascii_case(header) {
        return true;
    }
    if let Some(suffix) = name.strip_prefix('*') {
        if suffix.is_empty() {
            return true;
        }
        return header.to_ascii_lowercase().contains(&suffix.to_ascii_lowercase());
    }
    false
}
