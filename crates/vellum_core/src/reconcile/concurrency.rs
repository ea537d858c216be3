//! Bounded fan-out with cooperative abort.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::{StreamExt, TryStreamExt, stream};

use crate::error::AbortError;

/// Default cap on concurrently running store or filesystem operations.
pub const MAX_CONCURRENT_OPERATIONS: usize = 10;

/// Shared flag asking a running reconciliation to stop.
///
/// Clones share the flag. Once aborted, no new operation is scheduled and the
/// run fails with [`AbortError`]; work already in flight is dropped.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
    aborted: Arc<AtomicBool>,
}

impl AbortHandle {
    /// A handle that has not been triggered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every holder of this handle to stop.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    /// Whether [`abort`](Self::abort) was called.
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }
}

/// Run `f` over `items` with at most `limit` futures in flight.
///
/// Results come back in completion order. The first error stops scheduling
/// and is returned; completed work is kept.
pub async fn try_map_bounded<I, T, E, F, Fut>(
    items: I,
    limit: usize,
    abort: Option<&AbortHandle>,
    f: F,
) -> Result<Vec<T>, E>
where
    I: IntoIterator,
    F: Fn(I::Item) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<AbortError>,
{
    stream::iter(items)
        .map(|item| {
            let operation = if abort.is_some_and(AbortHandle::is_aborted) {
                None
            } else {
                Some(f(item))
            };
            async move {
                match operation {
                    Some(operation) => operation.await,
                    None => Err(AbortError::new("reconciliation aborted").into()),
                }
            }
        })
        .buffer_unordered(limit.max(1))
        .try_collect()
        .await
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::error::ReconcileError;
    use crate::test_utils::block_on;

    #[test]
    fn test_maps_all_items() {
        let mut out: Vec<u32> = block_on(try_map_bounded(1..=5u32, 2, None, |n| async move {
            Ok::<_, ReconcileError>(n * 10)
        }))
        .unwrap();
        out.sort();
        assert_eq!(out, vec![10, 20, 30, 40, 50]);
    }

    #[test]
    fn test_limit_is_respected() {
        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        block_on(try_map_bounded(0..20, 3, None, |_| {
            let in_flight = &in_flight;
            let peak = &peak;
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                futures_lite::future::yield_now().await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, ReconcileError>(())
            }
        }))
        .unwrap();
        assert_eq!(peak.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_first_error_is_returned() {
        let result = block_on(try_map_bounded(0..5, 2, None, |n| async move {
            if n == 2 {
                Err(ReconcileError::Abort(AbortError::new("boom")))
            } else {
                Ok(n)
            }
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_abort_stops_scheduling() {
        let handle = AbortHandle::new();
        let started = AtomicUsize::new(0);
        let result = block_on(try_map_bounded(0..10, 1, Some(&handle), |_| {
            let started = &started;
            let handle = &handle;
            async move {
                started.fetch_add(1, Ordering::SeqCst);
                handle.abort();
                Ok::<_, ReconcileError>(())
            }
        }));
        assert!(matches!(result, Err(ReconcileError::Abort(_))));
        assert_eq!(started.load(Ordering::SeqCst), 1);
    }
}
