//! Write-once evaluation result

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::oneshot;

use crate::common::{Error, Result};

pub(crate) type ResultSender<V> = oneshot::Sender<Result<V>>;

/// Outcome of one `eval`, completed exactly once by the worker
///
/// Await it from async code, or use [`PendingResult::wait`] from plain
/// threads. A result whose sender vanished without completing resolves to
/// [`Error::WorkerStopped`].
#[derive(Debug)]
pub struct PendingResult<V> {
    rx: oneshot::Receiver<Result<V>>,
}

impl<V> PendingResult<V> {
    pub(crate) fn channel() -> (ResultSender<V>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }

    /// A result that is already complete
    pub(crate) fn ready(outcome: Result<V>) -> Self {
        let (tx, pending) = Self::channel();
        let _ = tx.send(outcome);
        pending
    }

    /// Block the current thread until the result is complete
    ///
    /// Must not be called from within an async runtime; `.await` instead.
    pub fn wait(self) -> Result<V> {
        self.rx.blocking_recv().unwrap_or(Err(Error::WorkerStopped))
    }

    /// Block for at most `timeout`
    ///
    /// Must not be called from within an async runtime; wrap the future in
    /// `tokio::time::timeout` instead.
    pub fn wait_timeout(self, timeout: Duration) -> Result<V> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;
        // The timer has to be created inside the runtime it is driven by.
        let rx = self.rx;
        match runtime.block_on(async move { tokio::time::timeout(timeout, rx).await }) {
            Ok(received) => received.unwrap_or(Err(Error::WorkerStopped)),
            Err(_) => Err(Error::ResultTimeout(timeout.as_millis() as u64)),
        }
    }

    /// Take the outcome if it is already complete
    pub fn try_take(&mut self) -> Option<Result<V>> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(Error::WorkerStopped)),
        }
    }
}

impl<V> Future for PendingResult<V> {
    type Output = Result<V>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(Error::WorkerStopped)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_returns_sent_value() {
        let (tx, pending) = PendingResult::channel();
        tx.send(Ok(5)).unwrap();
        assert_eq!(pending.wait().unwrap(), 5);
    }

    #[test]
    fn test_dropped_sender_means_worker_stopped() {
        let (tx, pending) = PendingResult::<i32>::channel();
        drop(tx);
        assert!(matches!(pending.wait(), Err(Error::WorkerStopped)));
    }

    #[test]
    fn test_wait_timeout_expires() {
        let (_tx, pending) = PendingResult::<i32>::channel();
        let err = pending.wait_timeout(Duration::from_millis(20)).unwrap_err();
        assert!(matches!(err, Error::ResultTimeout(20)));
    }

    #[test]
    fn test_wait_timeout_returns_value_sent_from_another_thread() {
        let (tx, pending) = PendingResult::channel();
        let sender = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            tx.send(Ok(7)).unwrap();
        });
        assert_eq!(pending.wait_timeout(Duration::from_secs(5)).unwrap(), 7);
        sender.join().unwrap();
    }

    #[test]
    fn test_try_take() {
        let (tx, mut pending) = PendingResult::channel();
        assert!(pending.try_take().is_none());
        tx.send(Ok("done")).unwrap();
        assert_eq!(pending.try_take().unwrap().unwrap(), "done");
    }

    #[tokio::test]
    async fn test_await_ready() {
        let pending = PendingResult::ready(Ok(1));
        assert_eq!(pending.await.unwrap(), 1);
    }
}
