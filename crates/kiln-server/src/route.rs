//! Ordered route tables with group-skip links.
//!
//! Routes are matched in insertion order. A maximal contiguous run of
//! routes sharing the same leading URL segment forms a group; every
//! route's `next_group` index points at the first route whose segment
//! differs (or past the table end), so a mismatched segment skips the
//! whole run in one step. A route with an empty pattern is the terminal
//! default and always stays last.

use kiln_http::{HttpLimits, Method, Pipeline, Rx, Tx, Verdict, METHOD_MASK_ALL};
use std::collections::HashMap;
use std::sync::Arc;

/// Creates request pipelines for the routes that reference it.
pub trait Handler: Send + Sync {
    /// Handler name, for diagnostics and route listings.
    fn name(&self) -> &str;

    /// Creates a pipeline for one request.
    fn pipeline(&self) -> Box<dyn Pipeline>;
}

/// One entry in a host's route table.
#[derive(Clone)]
pub struct Route {
    /// Route name.
    pub name: String,
    /// Match pattern; empty for the terminal default route.
    pub pattern: String,
    /// Pattern pre-split into segments.
    compiled: Vec<String>,
    /// First URL segment of the pattern; empty matches everything.
    pub start_segment: String,
    /// Accepted methods as a bitmask of [`Method::bit`] values.
    pub methods: u32,
    /// Handler target description (document root, proxy address, ...).
    pub target: String,
    /// Handler serving matched requests.
    pub handler: Option<Arc<dyn Handler>>,
    /// Limits for connections dispatched through this route.
    pub limits: Option<Arc<HttpLimits>>,
    /// Per-status error document overrides.
    error_documents: HashMap<u16, String>,
    /// Index of the first route outside this route's segment group.
    pub next_group: usize,
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("name", &self.name)
            .field("pattern", &self.pattern)
            .field("start_segment", &self.start_segment)
            .field("methods", &self.methods)
            .field("next_group", &self.next_group)
            .finish()
    }
}

impl Route {
    /// Creates a route matching URIs under `pattern`. An empty pattern
    /// creates a default route matching everything.
    #[must_use]
    pub fn new(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        let compiled: Vec<String> = pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        let start_segment = compiled.first().cloned().unwrap_or_default();
        Self {
            name: name.into(),
            pattern,
            compiled,
            start_segment,
            methods: METHOD_MASK_ALL,
            target: String::new(),
            handler: None,
            limits: None,
            error_documents: HashMap::new(),
            next_group: 0,
        }
    }

    /// Restricts the route to the given methods.
    #[must_use]
    pub fn with_methods(mut self, methods: &[Method]) -> Self {
        self.methods = methods.iter().fold(0, |mask, m| mask | m.bit());
        self
    }

    /// Sets the handler target description.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    /// Sets the handler serving this route.
    #[must_use]
    pub fn with_handler(mut self, handler: Arc<dyn Handler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Sets the limits carried by this route.
    #[must_use]
    pub fn with_limits(mut self, limits: HttpLimits) -> Self {
        self.limits = Some(Arc::new(limits));
        self
    }

    /// Registers an error document URL for a status code.
    pub fn add_error_document(&mut self, status: u16, url: impl Into<String>) {
        self.error_documents.insert(status, url.into());
    }

    /// Looks up an error document override.
    #[must_use]
    pub fn error_document(&self, status: u16) -> Option<&str> {
        self.error_documents.get(&status).map(String::as_str)
    }

    /// True if this route accepts the request.
    #[must_use]
    pub fn matches(&self, method: Method, path: &str) -> bool {
        if self.methods & method.bit() == 0 {
            return false;
        }
        if self.compiled.is_empty() {
            return true;
        }
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        for want in &self.compiled {
            match segments.next() {
                Some(got) if got == want => {}
                _ => return false,
            }
        }
        true
    }
}

/// First segment of a normalized path.
#[must_use]
pub fn first_segment(path: &str) -> &str {
    path.split('/').find(|s| !s.is_empty()).unwrap_or("")
}

/// A host's ordered route list.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// True if the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// The routes in match order.
    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Inserts a route, keeping the terminal default route last and
    /// updating the group-skip links.
    ///
    /// When the new route starts a new segment group, the immediately
    /// preceding route and every contiguous predecessor sharing its
    /// segment get their `next_group` pointed at the new route.
    pub fn add(&mut self, mut route: Route) {
        if self.routes.iter().any(|r| r.name == route.name) {
            return;
        }
        let len = self.routes.len();
        let insert_before_default = !route.pattern.is_empty()
            && self
                .routes
                .last()
                .is_some_and(|last| last.pattern.is_empty());
        let index = if insert_before_default { len - 1 } else { len };

        route.next_group = index + 1;
        self.routes.insert(index, route);
        if self.routes.len() > index + 1 {
            // The shifted default route's skip target moved with it.
            self.routes[index + 1].next_group = self.routes.len();
        }

        if index > 0 {
            let prev_segment = self.routes[index - 1].start_segment.clone();
            if prev_segment != self.routes[index].start_segment {
                self.routes[index - 1].next_group = index;
                for i in (0..index - 1).rev() {
                    if self.routes[i].start_segment == prev_segment {
                        self.routes[i].next_group = index;
                    } else {
                        break;
                    }
                }
            } else {
                // Same group: the predecessors now skip past the newcomer.
                let group_end = index + 1;
                self.routes[index].next_group = group_end;
                for i in (0..index).rev() {
                    if self.routes[i].start_segment == prev_segment {
                        self.routes[i].next_group = group_end;
                    } else {
                        break;
                    }
                }
            }
        }
    }

    /// Finds the first route accepting the request, skipping whole groups
    /// whose leading segment cannot match.
    #[must_use]
    pub fn route(&self, method: Method, path: &str) -> Option<&Route> {
        let segment = first_segment(path);
        let mut i = 0;
        while i < self.routes.len() {
            let route = &self.routes[i];
            if !route.start_segment.is_empty() && route.start_segment != segment {
                i = if route.next_group > i { route.next_group } else { i + 1 };
                continue;
            }
            if route.matches(method, path) {
                return Some(route);
            }
            i += 1;
        }
        None
    }

    /// Looks up a route by name. An empty name means `default`.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&Route> {
        let name = if name.is_empty() { "default" } else { name };
        self.routes.iter().find(|r| r.name == name)
    }

    /// Looks up a route by pattern. `/`, `^/` and `^/$` alias the empty
    /// default pattern.
    #[must_use]
    pub fn lookup_by_pattern(&self, pattern: &str) -> Option<&Route> {
        let pattern = match pattern {
            "/" | "^/" | "^/$" => "",
            other => other,
        };
        self.routes.iter().find(|r| r.pattern == pattern)
    }

    /// Checks the group-skip invariant: every `next_group` points at the
    /// first index whose segment differs, or past the table end, and the
    /// terminal default route (if any) is last.
    #[must_use]
    pub fn check_group_links(&self) -> bool {
        for (i, route) in self.routes.iter().enumerate() {
            let expected = self.routes[i + 1..]
                .iter()
                .position(|r| r.start_segment != route.start_segment)
                .map_or(self.routes.len(), |off| i + 1 + off);
            if route.next_group != expected {
                return false;
            }
        }
        for (i, route) in self.routes.iter().enumerate() {
            if route.pattern.is_empty() && i + 1 != self.routes.len() {
                return false;
            }
        }
        true
    }
}

/// A handler answering every request with a fixed status and body.
pub struct StaticHandler {
    name: String,
    status: u16,
    body: Vec<u8>,
}

impl StaticHandler {
    /// Creates a handler answering with `status` and `body`.
    #[must_use]
    pub fn new(name: impl Into<String>, status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            status,
            body: body.into(),
        }
    }
}

impl Handler for StaticHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn pipeline(&self) -> Box<dyn Pipeline> {
        Box::new(StaticPipeline {
            status: self.status,
            body: self.body.clone(),
        })
    }
}

struct StaticPipeline {
    status: u16,
    body: Vec<u8>,
}

impl Pipeline for StaticPipeline {
    fn process(
        &mut self,
        rx: &mut Rx,
        tx: &mut Tx,
        recv: &mut kiln_http::RecvQueue,
    ) -> Verdict {
        // Drain the request body; this handler ignores it.
        let (_, eof) = recv.drain_data();
        if !eof && !rx.eof {
            return Verdict::Pending;
        }
        tx.status = self.status;
        let head = format!(
            "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nContent-Type: text/plain\r\n\r\n",
            self.status,
            kiln_http::status_text(self.status),
            self.body.len()
        );
        tx.output.extend_from_slice(head.as_bytes());
        if rx.method.map_or(true, |m| !m.omits_body()) {
            tx.output.extend_from_slice(&self.body);
        }
        Verdict::Complete
    }
}
