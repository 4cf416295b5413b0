//! Pending offload handles
//!
//! A pending operation is a [`Completion`] held by the worker side and a
//! [`Deferred`] held by the caller. The completion fires at most once; a
//! second attempt is rejected and logged.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::failure::Failure;
use crate::logger;

/// Outcome delivered to the continuation
pub type Outcome<T> = Result<T, Failure>;

static NEXT_OPERATION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CompletionError {
    #[error("offloaded operation #{0} was already completed")]
    AlreadyCompleted(u64),

    #[error("continuation of offloaded operation #{0} was abandoned")]
    Abandoned(u64),
}

/// Create a linked completion/deferred pair
pub fn pending<T>() -> (Completion<T>, Deferred<T>) {
    let id = NEXT_OPERATION_ID.fetch_add(1, Ordering::Relaxed);
    let (tx, rx) = oneshot::channel();
    (
        Completion {
            id,
            sender: Arc::new(Mutex::new(Some(tx))),
        },
        Deferred { id, receiver: rx },
    )
}

/// Worker-side half: delivers the outcome of an offloaded operation
pub struct Completion<T> {
    id: u64,
    sender: Arc<Mutex<Option<oneshot::Sender<Outcome<T>>>>>,
}

impl<T> Clone for Completion<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            sender: Arc::clone(&self.sender),
        }
    }
}

impl<T> Completion<T> {
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Deliver the outcome.
    ///
    /// Returns [`CompletionError::AlreadyCompleted`] if an outcome was
    /// delivered before, and [`CompletionError::Abandoned`] if the caller
    /// dropped its [`Deferred`].
    pub fn complete(&self, outcome: Outcome<T>) -> Result<(), CompletionError> {
        let sender = {
            let mut slot = self
                .sender
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            slot.take()
        };

        let Some(sender) = sender else {
            logger::log_error(&format!(
                "Offloaded operation #{} completed twice; second outcome dropped",
                self.id
            ));
            return Err(CompletionError::AlreadyCompleted(self.id));
        };

        sender
            .send(outcome)
            .map_err(|_| CompletionError::Abandoned(self.id))
    }

    #[cfg(test)]
    pub fn is_completed(&self) -> bool {
        self.sender
            .lock()
            .map_or(true, |slot| slot.is_none())
    }
}

/// Caller-side half: resolves once with the operation's outcome
#[derive(Debug)]
pub struct Deferred<T> {
    id: u64,
    receiver: oneshot::Receiver<Outcome<T>>,
}

#[cfg(test)]
impl<T> Deferred<T> {
    pub const fn id(&self) -> u64 {
        self.id
    }
}

impl<T> Future for Deferred<T> {
    type Output = Outcome<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let id = self.id;
        Pin::new(&mut self.receiver).poll(cx).map(|received| {
            received.unwrap_or_else(|_| {
                Err(Failure::internal(format!(
                    "offloaded operation #{id} ended without delivering a result"
                )))
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::StatusCode;

    #[tokio::test]
    async fn test_complete_once() {
        let (completion, deferred) = pending::<u32>();
        assert!(!completion.is_completed());
        assert_eq!(completion.complete(Ok(7)), Ok(()));
        assert!(completion.is_completed());
        assert_eq!(deferred.await, Ok(7));
    }

    #[tokio::test]
    async fn test_double_complete_is_rejected() {
        let (completion, deferred) = pending::<u32>();
        let twin = completion.clone();

        completion.complete(Ok(1)).unwrap();
        assert_eq!(
            twin.complete(Ok(2)),
            Err(CompletionError::AlreadyCompleted(completion.id()))
        );
        assert_eq!(deferred.await, Ok(1));
    }

    #[tokio::test]
    async fn test_abandoned_continuation() {
        let (completion, deferred) = pending::<u32>();
        let id = deferred.id();
        drop(deferred);
        assert_eq!(completion.complete(Ok(1)), Err(CompletionError::Abandoned(id)));
    }

    #[tokio::test]
    async fn test_dropped_completion_resolves_to_failure() {
        let (completion, deferred) = pending::<u32>();
        drop(completion);
        let failure = deferred.await.unwrap_err();
        assert_eq!(failure.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(failure.message().contains("without delivering a result"));
    }
}
