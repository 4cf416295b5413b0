//! Blocking bridge module
//!
//! Runs blocking work (store initialization, store round trips) on the
//! runtime's blocking pool and hands the outcome back to async code without
//! ever blocking the accepting loop.

mod pending;

pub use pending::Deferred;

use pending::{pending, CompletionError};

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;

use crate::failure::Failure;
use crate::logger;

/// Offloads blocking operations to worker threads.
///
/// Cheap to clone; all clones share the same in-flight counter.
#[derive(Debug, Clone)]
pub struct BlockingBridge {
    runtime: Handle,
    in_flight: Arc<AtomicUsize>,
}

impl BlockingBridge {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Bridge bound to the runtime of the calling task
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// Number of operations submitted but not yet finished
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Run `operation` on a worker thread.
    ///
    /// The returned [`Deferred`] resolves exactly once: with the value, with
    /// the operation's error converted into a [`Failure`], or with a 500
    /// failure carrying the panic message if the operation panicked. Once
    /// submitted an operation always runs to completion, even if the
    /// `Deferred` is dropped.
    pub fn offload<T, E, F>(&self, operation: F) -> Deferred<T>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Into<Failure>,
    {
        let (completion, deferred) = pending();
        let in_flight = Arc::clone(&self.in_flight);
        in_flight.fetch_add(1, Ordering::SeqCst);

        self.runtime.spawn_blocking(move || {
            let outcome = match panic::catch_unwind(AssertUnwindSafe(operation)) {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) => Err(err.into()),
                Err(payload) => {
                    let failure = Failure::from_panic(payload.as_ref());
                    logger::log_bridge_fault(completion.id(), failure.message());
                    Err(failure)
                }
            };
            in_flight.fetch_sub(1, Ordering::SeqCst);

            match completion.complete(outcome) {
                Ok(()) => {}
                Err(CompletionError::Abandoned(id)) => logger::log_abandoned_operation(id),
                Err(err) => logger::log_error(&err.to_string()),
            }
        });

        deferred
    }
}
