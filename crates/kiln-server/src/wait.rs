//! Wait glue: suspend until a connection reaches a lifecycle state.
//!
//! A waiter observes the connection's status channel; the watch receiver
//! acts as the temporary wait handler and is dropped on every exit path.
//! Timing out leaves the connection intact; a closed channel means the
//! connection itself is gone.

use crate::service::ConnStatus;
use kiln_http::ConnState;
use std::time::Duration;
use tokio::sync::watch;

/// Result of a state wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The target state (or a later one) was reached.
    Reached,
    /// The deadline expired first; the connection is still usable.
    Timeout,
    /// The connection died before reaching the state.
    Connection,
}

/// Waits until the connection reaches `state`, its task exits, or
/// `timeout` elapses.
///
/// Because a keep-alive connection rewinds to BEGIN after each request,
/// waiting for [`ConnState::Complete`] also succeeds when the completed
/// request counter advances past its value at call time.
pub async fn wait_for_state(
    mut status: watch::Receiver<ConnStatus>,
    state: ConnState,
    timeout: Duration,
) -> WaitOutcome {
    let start_completed = status.borrow().completed;
    let reached = |s: &ConnStatus| {
        s.state >= state || (state == ConnState::Complete && s.completed > start_completed)
    };

    if reached(&status.borrow()) {
        return WaitOutcome::Reached;
    }
    let wait = async {
        loop {
            if status.changed().await.is_err() {
                return WaitOutcome::Connection;
            }
            let current = *status.borrow();
            if reached(&current) {
                return WaitOutcome::Reached;
            }
        }
    };
    match tokio::time::timeout(timeout, wait).await {
        Ok(outcome) => outcome,
        Err(_) => WaitOutcome::Timeout,
    }
}
