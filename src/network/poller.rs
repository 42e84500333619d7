//! Polling watchers - fixed-interval re-fetch with owner-controlled teardown
//!
//! [`watch`] runs a fetch immediately and then once per period on a Tokio
//! task. Every outcome, success or failure, is handed to the returned
//! [`Subscription`]; a failed fetch is logged and polling carries on. There is
//! no jitter and no backoff. Cancelling or dropping the subscription stops the
//! task, abandoning any fetch still in flight.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::stream::Stream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::constants::WATCH_BUFFER;
use crate::models::{Message, Notification};
use crate::network::client::{ApiClient, ApiError};
use crate::notifications::unread_new_requests;

/// Handle to a running poll loop
pub struct Subscription<T> {
    rx: mpsc::Receiver<Result<T, ApiError>>,
    cancel_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl<T> Subscription<T> {
    /// Next poll outcome; `None` once the watcher has stopped and drained
    pub async fn recv(&mut self) -> Option<Result<T, ApiError>> {
        self.rx.recv().await
    }

    /// Stop polling. Outcomes already delivered can still be received.
    pub fn cancel(&mut self) {
        if let Some(cancel_tx) = self.cancel_tx.take() {
            tracing::debug!("Cancelling watcher");
            let _ = cancel_tx.send(());
        }
        self.rx.close();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_tx.is_none()
    }

    /// True once the poll task has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl<T> Stream for Subscription<T> {
    type Item = Result<T, ApiError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

/// Poll `fetch` every `period` until the subscription is cancelled or dropped
pub fn watch<T, F, Fut>(period: Duration, mut fetch: F) -> Subscription<T>
where
    T: Send + 'static,
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(WATCH_BUFFER);
    let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();

    // tokio::time::interval panics on a zero period
    let period = period.max(Duration::from_millis(1));

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = &mut cancel_rx => break,
                _ = ticker.tick() => {}
            }

            let outcome = tokio::select! {
                biased;
                _ = &mut cancel_rx => break,
                outcome = fetch() => outcome,
            };

            if let Err(e) = &outcome {
                tracing::warn!(error = %e, "Poll failed");
            }

            tokio::select! {
                biased;
                _ = &mut cancel_rx => break,
                sent = tx.send(outcome) => {
                    if sent.is_err() {
                        // Subscriber went away
                        break;
                    }
                }
            }
        }

        tracing::debug!("Watcher stopped");
    });

    Subscription {
        rx,
        cancel_tx: Some(cancel_tx),
        task,
    }
}

impl ApiClient {
    /// Chat refresh for one request
    pub fn watch_messages(&self, request_id: i64, period: Duration) -> Subscription<Vec<Message>> {
        let client = self.clone();
        watch(period, move || {
            let client = client.clone();
            async move { client.messages(request_id).await }
        })
    }

    pub fn watch_notifications(&self, period: Duration) -> Subscription<Vec<Notification>> {
        let client = self.clone();
        watch(period, move || {
            let client = client.clone();
            async move { client.notifications().await }
        })
    }

    /// Mechanic badge: unread `new_request` notifications
    pub fn watch_unread_requests(&self, period: Duration) -> Subscription<usize> {
        let client = self.clone();
        watch(period, move || {
            let client = client.clone();
            async move {
                let notifications = client.notifications().await?;
                Ok(unread_new_requests(&notifications))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting(counter: Arc<AtomicUsize>) -> Subscription<usize> {
        watch(Duration::from_secs(3), move || {
            let counter = counter.clone();
            async move { Ok(counter.fetch_add(1, Ordering::SeqCst) + 1) }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetches_immediately_then_every_period() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut sub = counting(counter.clone());

        assert_eq!(sub.recv().await.unwrap().unwrap(), 1);
        assert_eq!(sub.recv().await.unwrap().unwrap(), 2);
        assert_eq!(sub.recv().await.unwrap().unwrap(), 3);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_are_delivered_and_polling_continues() {
        let counter = Arc::new(AtomicUsize::new(0));
        let calls = counter.clone();
        let mut sub = watch(Duration::from_secs(10), move || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(ApiError::Http {
                        status: 500,
                        body: String::new(),
                    })
                } else {
                    Ok(n)
                }
            }
        });

        let first = sub.recv().await.unwrap();
        assert_eq!(first.unwrap_err().status(), Some(500));
        assert_eq!(sub.recv().await.unwrap().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_fetching() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut sub = counting(counter.clone());

        assert!(sub.recv().await.is_some());
        sub.cancel();
        assert!(sub.is_cancelled());

        let seen = counter.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(counter.load(Ordering::SeqCst), seen);

        // Drain anything buffered before the cancel, then the stream ends
        while sub.recv().await.is_some() {}
        assert!(sub.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_fetching() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut sub = counting(counter.clone());
        assert!(sub.next().await.is_some());
        drop(sub);

        let seen = counter.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(counter.load(Ordering::SeqCst), seen);
    }
}
