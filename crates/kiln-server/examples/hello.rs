//! Minimal kiln server: one endpoint, one host, one static route.
//!
//! Run with `cargo run --example hello`, then:
//!
//! ```text
//! curl -v http://127.0.0.1:8080/
//! ```

use kiln_server::{configured_endpoint, Http, Route, StaticHandler};
use std::sync::Arc;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let service = Arc::new(Http::new());
    let route = Route::new("default", "")
        .with_handler(Arc::new(StaticHandler::new("hello", 200, "Hello from kiln\n")));
    let endpoint = configured_endpoint(&service, "127.0.0.1", 8080, route);
    let addr = service.start_endpoint(&endpoint).await?;
    println!("listening on http://{addr}/");

    tokio::signal::ctrl_c().await?;
    service.stop_endpoint(&endpoint);
    Ok(())
}
