// src/ingest/bounded.rs
//! Run one remote call under a hard deadline.
//!
//! The operation runs on its own detached task and reports back over a one-slot
//! `oneshot` channel. The caller races that channel against a child cancellation
//! token and the deadline timer. If the caller gives up first, the task keeps running
//! to completion and its `send` simply fails; nothing blocks and nothing panics.

use std::future::Future;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::error::FetchError;

/// Reference deadline for the news search call.
pub const DEFAULT_FETCH_DEADLINE: Duration = Duration::from_millis(500);

/// Execute `op` on a detached task and wait at most `deadline` for its result.
///
/// Returns the operation's own result unchanged when it finishes in time, or
/// `FetchError::Timeout` carrying `deadline` when the deadline elapses or `parent`
/// is cancelled first.
pub async fn fetch_with_deadline<T, F, Fut>(
    parent: &CancellationToken,
    deadline: Duration,
    op: F,
) -> Result<T, FetchError>
where
    T: Send + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
{
    let scope = parent.child_token();
    let (tx, rx) = oneshot::channel();

    let fut = op();
    tokio::spawn(async move {
        let res = fut.await;
        if tx.send(res).is_err() {
            tracing::debug!(target: "ingest", "fetch finished after caller gave up; result dropped");
        }
    });

    let out = tokio::select! {
        _ = scope.cancelled() => Err(FetchError::Timeout { deadline }),
        _ = tokio::time::sleep(deadline) => Err(FetchError::Timeout { deadline }),
        recv = rx => match recv {
            Ok(res) => res,
            // sender dropped without a value: the task panicked
            Err(_) => Err(FetchError::Transport("fetch task aborted".to_string())),
        },
    };

    // Release the child scope right away; the parent is untouched.
    scope.cancel();
    out
}
