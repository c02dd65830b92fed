//! Callback-pair delivery for hosts that are not written with `async`.
//!
//! Every adapter operation that may perform I/O is a future. [`deliver_on`]
//! runs such a future on a runtime and calls exactly one of the two
//! callbacks exactly once. A panicking adapter future is reported through the
//! failure callback, so the host is never left waiting.

use crate::error::{DataError, Result};
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::error;

/// Spawn `future` on `handle`; `success` or `failure` fires once it settles
pub fn deliver_on<T, Fut, S, F>(handle: &Handle, future: Fut, success: S, failure: F) -> JoinHandle<()>
where
    T: Send + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
    S: FnOnce(T) + Send + 'static,
    F: FnOnce(DataError) + Send + 'static,
{
    handle.spawn(async move {
        match AssertUnwindSafe(future).catch_unwind().await {
            Ok(Ok(value)) => success(value),
            Ok(Err(err)) => failure(err),
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!("Adapter operation panicked: {}", message);
                failure(DataError::Internal(format!("adapter panicked: {}", message)))
            }
        }
    })
}

/// [`deliver_on`] the runtime of the calling task.
///
/// # Panics
///
/// Panics when called outside a tokio runtime.
pub fn deliver<T, Fut, S, F>(future: Fut, success: S, failure: F) -> JoinHandle<()>
where
    T: Send + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
    S: FnOnce(T) + Send + 'static,
    F: FnOnce(DataError) + Send + 'static,
{
    deliver_on(&Handle::current(), future, success, failure)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Tally {
        successes: AtomicUsize,
        failures: AtomicUsize,
    }

    async fn run(future: impl Future<Output = Result<u32>> + Send + 'static) -> Arc<Tally> {
        let tally = Arc::new(Tally::default());
        let (on_success, on_failure) = (tally.clone(), tally.clone());
        deliver(
            future,
            move |_| {
                on_success.successes.fetch_add(1, Ordering::SeqCst);
            },
            move |_| {
                on_failure.failures.fetch_add(1, Ordering::SeqCst);
            },
        )
        .await
        .unwrap();
        tally
    }

    #[tokio::test]
    async fn test_success_delivered_once() {
        let tally = run(async { Ok(7) }).await;
        assert_eq!(tally.successes.load(Ordering::SeqCst), 1);
        assert_eq!(tally.failures.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failure_delivered_once() {
        let tally = run(async { Err(DataError::Cancelled) }).await;
        assert_eq!(tally.successes.load(Ordering::SeqCst), 0);
        assert_eq!(tally.failures.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panic_becomes_failure() {
        let tally = run(async {
            if true {
                panic!("driver exploded");
            }
            Ok(0)
        })
        .await;
        assert_eq!(tally.successes.load(Ordering::SeqCst), 0);
        assert_eq!(tally.failures.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_carries_error() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        deliver(
            async { Err::<(), _>(DataError::Timeout(250)) },
            |_| panic!("unexpected success"),
            move |err| {
                let _ = tx.send(err);
            },
        );
        assert_eq!(rx.await.unwrap(), DataError::Timeout(250));
    }
}
