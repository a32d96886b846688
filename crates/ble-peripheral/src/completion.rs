//! Completion handles for adapter round-trips

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

use crate::error::{PeripheralError, Result};
use crate::events::EventKind;

/// Outcome of a command, delivered when the adapter emits the matching event.
///
/// A `Completion` resolves at most once. It stays pending for as long as the
/// adapter stays silent; there is no cancellation, so callers that cannot
/// wait forever should wrap it in `tokio::time::timeout`. Dropping it only
/// discards the result, the one-shot listener still consumes the next event.
#[derive(Debug)]
#[must_use = "a Completion does nothing unless awaited or polled with try_take"]
pub struct Completion<T> {
    event: EventKind,
    rx: oneshot::Receiver<Result<T>>,
    resolved: bool,
}

impl<T> Completion<T> {
    pub(crate) fn new(event: EventKind, rx: oneshot::Receiver<Result<T>>) -> Self {
        Self {
            event,
            rx,
            resolved: false,
        }
    }

    /// Event this completion is waiting for
    pub fn event(&self) -> EventKind {
        self.event
    }

    /// Whether the outcome has already been handed out
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Take the outcome if it has arrived, without waiting.
    ///
    /// Returns `None` while pending and again after the outcome was taken.
    /// Awaiting a handle whose outcome was already taken yields
    /// [`PeripheralError::CompletionTaken`].
    pub fn try_take(&mut self) -> Option<Result<T>> {
        if self.resolved {
            return None;
        }
        let outcome = match self.rx.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Closed) => {
                Err(PeripheralError::CompletionDropped { event: self.event })
            }
        };
        self.resolved = true;
        Some(outcome)
    }
}

impl<T> Future for Completion<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let event = self.event;
        if self.resolved {
            return Poll::Ready(Err(PeripheralError::CompletionTaken { event }));
        }
        let outcome = std::task::ready!(Pin::new(&mut self.rx).poll(cx));
        self.resolved = true;
        Poll::Ready(outcome.unwrap_or(Err(PeripheralError::CompletionDropped { event })))
    }
}

/// Create a linked sender / completion pair for `event`
pub(crate) fn channel<T>(event: EventKind) -> (oneshot::Sender<Result<T>>, Completion<T>) {
    let (tx, rx) = oneshot::channel();
    (tx, Completion::new(event, rx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_take_pending_then_ready() {
        let (tx, mut completion) = channel::<u16>(EventKind::MtuChange);
        assert!(completion.try_take().is_none());

        tx.send(Ok(185)).unwrap();
        assert_eq!(completion.try_take(), Some(Ok(185)));
        assert!(completion.is_resolved());
        assert_eq!(completion.try_take(), None);
    }

    #[test]
    fn test_dropped_sender_reports_event() {
        let (tx, mut completion) = channel::<()>(EventKind::AdvertisingStop);
        drop(tx);
        assert_eq!(
            completion.try_take(),
            Some(Err(PeripheralError::CompletionDropped {
                event: EventKind::AdvertisingStop
            }))
        );
    }

    #[tokio::test]
    async fn test_await_resolves() {
        let (tx, completion) = channel::<i8>(EventKind::RssiUpdate);
        assert_eq!(completion.event(), EventKind::RssiUpdate);
        tx.send(Ok(-60)).unwrap();
        assert_eq!(completion.await, Ok(-60));
    }

    #[tokio::test]
    async fn test_await_after_try_take_reports_taken() {
        let (tx, mut completion) = channel::<()>(EventKind::AdvertisingStop);
        tx.send(Ok(())).unwrap();
        assert_eq!(completion.try_take(), Some(Ok(())));

        assert_eq!(
            completion.await,
            Err(PeripheralError::CompletionTaken {
                event: EventKind::AdvertisingStop
            })
        );
    }

    #[tokio::test]
    async fn test_poll_after_ready_reports_taken() {
        let (tx, mut completion) = channel::<u16>(EventKind::MtuChange);
        tx.send(Ok(23)).unwrap();

        assert_eq!((&mut completion).await, Ok(23));
        assert!(completion.is_resolved());
        assert_eq!(
            (&mut completion).await,
            Err(PeripheralError::CompletionTaken {
                event: EventKind::MtuChange
            })
        );
    }
}
