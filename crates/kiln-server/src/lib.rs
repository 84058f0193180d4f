//! Endpoint, host and route dispatch for the kiln HTTP core.
//!
//! This crate owns the sockets. An [`Endpoint`] binds a listener and
//! accepts connections; each accepted socket runs on its own cooperative
//! task that feeds the `kiln-http` state machine. Requests are dispatched
//! through the endpoint's ordered [`Host`] list (named virtual hosts with
//! wildcard matching) and each host's [`RouteTable`] (ordered routes with
//! group-skip links) to a [`Handler`].
//!
//! # Example
//!
//! ```ignore
//! use kiln_server::{configured_endpoint, Http, Route, StaticHandler};
//! use std::sync::Arc;
//!
//! let service = Arc::new(Http::new());
//! let route = Route::new("default", "")
//!     .with_handler(Arc::new(StaticHandler::new("hello", 200, "Hello")));
//! let endpoint = configured_endpoint(&service, "127.0.0.1", 8080, route);
//! let addr = service.start_endpoint(&endpoint).await?;
//! ```

#![deny(unsafe_code)]
// Pedantic clippy lints allowed (style suggestions, not correctness issues)
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::single_match_else)]
#![allow(clippy::needless_pass_by_value)]

mod endpoint;
mod host;
mod route;
mod service;
mod wait;

pub use endpoint::{DispatchMode, Endpoint};
pub use host::{host_name_matches, Host, ResponseCache, PROTOCOL_HTTP_10, PROTOCOL_HTTP_11};
pub use route::{first_segment, Handler, Route, RouteTable, StaticHandler};
pub use service::{configured_endpoint, ConnStatus, Http};
pub use wait::{wait_for_state, WaitOutcome};
