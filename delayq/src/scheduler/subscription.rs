//! Subscription stream
//!
//! Each subscription runs its own poll loop inside the stream future; no
//! task is spawned. The loop:
//!
//! 1. waits while the store is unreachable,
//! 2. takes the earliest due task and yields it, re-querying immediately
//!    while tasks remain due,
//! 3. sleeps for the polling interval once nothing is due.

use super::{Dispatch, Shared};
use crate::codec::PayloadCodec;
use crate::connection::{wait_reachable_on, LinkStatus};
use crate::Result;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::watch;

/// Cancels a subscription from outside the stream
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    cancel: Arc<watch::Sender<bool>>,
}

impl SubscriptionHandle {
    /// Stop the poll loop. The stream ends at its next suspension point.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }
}

/// Stream of due payloads for one topic
///
/// Yields `Ok(payload)` for each delivered task. Store outages pause the
/// stream without yielding anything. The stream ends after an `Err` (a
/// malformed payload, or the transport giving up) or after cancellation.
pub struct Subscription<T> {
    inner: BoxStream<'static, Result<T>>,
    handle: SubscriptionHandle,
}

impl<T: Send + 'static> Subscription<T> {
    pub(crate) fn start<C>(shared: Arc<Shared<T, C>>) -> Self
    where
        C: PayloadCodec<T> + 'static,
    {
        tracing::info!("Subscription started on topic '{}'", shared.topic);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let poll_loop = PollLoop {
            link: shared.store.connection().subscribe(),
            shared,
            cancel: cancel_rx,
            finished: false,
        };

        let inner = stream::unfold(poll_loop, |mut poll_loop| async move {
            let item = poll_loop.next_item().await?;
            Some((item, poll_loop))
        })
        .boxed();

        Self {
            inner,
            handle: SubscriptionHandle {
                cancel: Arc::new(cancel_tx),
            },
        }
    }
}

impl<T> Subscription<T> {
    /// Handle that can cancel this subscription
    pub fn handle(&self) -> SubscriptionHandle {
        self.handle.clone()
    }

    /// Stop the poll loop
    pub fn cancel(&self) {
        self.handle.cancel();
    }
}

impl<T> Stream for Subscription<T> {
    type Item = Result<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

struct PollLoop<T, C> {
    shared: Arc<Shared<T, C>>,
    link: watch::Receiver<LinkStatus>,
    cancel: watch::Receiver<bool>,
    finished: bool,
}

impl<T, C> PollLoop<T, C>
where
    T: Send + 'static,
    C: PayloadCodec<T> + 'static,
{
    /// Run until the next item, or `None` when the stream is over
    async fn next_item(&mut self) -> Option<Result<T>> {
        loop {
            if self.finished || *self.cancel.borrow() {
                tracing::info!("Subscription on topic '{}' stopped", self.shared.topic);
                return None;
            }

            let reachable = self.link.borrow().is_reachable();
            if let Some(metrics) = &self.shared.metrics {
                metrics.set_store_reachable(reachable);
            }

            if !reachable {
                tracing::debug!("Store unreachable, pausing topic '{}'", self.shared.topic);
                tokio::select! {
                    result = wait_reachable_on(&mut self.link) => {
                        if let Err(e) = result {
                            tracing::error!("Subscription on topic '{}' lost its store: {}", self.shared.topic, e);
                            self.finished = true;
                            return Some(Err(e));
                        }
                        tracing::debug!("Store reachable, resuming topic '{}'", self.shared.topic);
                    }
                    _ = cancelled(&mut self.cancel) => return None,
                }
                continue;
            }

            match self.shared.dispatch_next().await {
                Ok(Dispatch::Delivered(value)) => return Some(Ok(value)),
                Ok(Dispatch::Skipped) => continue,
                Ok(Dispatch::Idle) => {
                    let interval = self.shared.options.polling_interval;
                    if !self.pause(interval).await {
                        return None;
                    }
                }
                Err(e) if e.is_fatal() => {
                    self.finished = true;
                    return Some(Err(e));
                }
                Err(e) => {
                    // Transport failure; the task stays indexed and is retried
                    tracing::warn!("Poll on topic '{}' failed: {}", self.shared.topic, e);
                    let interval = self.shared.options.polling_interval;
                    if !self.pause(interval).await {
                        return None;
                    }
                }
            }
        }
    }

    /// Sleep unless cancelled first. Returns false on cancellation.
    async fn pause(&mut self, interval: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(interval) => true,
            _ = cancelled(&mut self.cancel) => false,
        }
    }
}

/// Resolves once cancellation is requested
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|cancelled| *cancelled).await;
}
