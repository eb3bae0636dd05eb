use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, trace};
use uuid::Uuid;

use crate::pipeline::events::PipelineEvent;
use crate::stream::framing::encode_frame;

/// Producer half of one run's event stream.
///
/// The orchestrator owns it and must call [`close`](Self::close) on every
/// exit path; `Drop` closes as a fallback. Once the shared cancellation
/// token fires (consumer gone or operator cancel) every emit is dropped.
pub struct StreamTransport {
    run_id: Uuid,
    tx: Option<mpsc::UnboundedSender<PipelineEvent>>,
    cancel: CancellationToken,
    heartbeat_stop: CancellationToken,
}

impl StreamTransport {
    /// Opens a channel tied to `cancel`. Dropping the returned receiver
    /// cancels the token.
    pub fn open(run_id: Uuid, cancel: CancellationToken) -> (Self, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let receiver = EventReceiver {
            rx,
            finished: false,
            _disconnect: cancel.clone().drop_guard(),
        };
        let transport = Self {
            run_id,
            tx: Some(tx),
            heartbeat_stop: cancel.child_token(),
            cancel,
        };
        (transport, receiver)
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_none()
    }

    /// Spawns the heartbeat task. The first beat goes out one full interval
    /// after the call; the task stops on close or cancellation.
    pub fn start_heartbeat(&self, interval: Duration) {
        let Some(tx) = self.tx.clone() else {
            return;
        };
        let stop = self.heartbeat_stop.clone();
        let cancel = self.cancel.clone();
        let run_id = self.run_id;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => {
                        if tx.send(PipelineEvent::heartbeat_now()).is_err() {
                            debug!(%run_id, "Heartbeat receiver gone, cancelling run");
                            cancel.cancel();
                            break;
                        }
                        trace!(%run_id, "Heartbeat sent");
                    }
                }
            }
        });
    }

    /// Queues an event. Returns `false` if it was not delivered; a failed
    /// send means the consumer is gone and cancels the run.
    pub fn emit(&self, event: PipelineEvent) -> bool {
        if self.cancel.is_cancelled() {
            trace!(run_id = %self.run_id, "Dropping {} event after cancellation", event.label());
            return false;
        }
        let Some(tx) = &self.tx else {
            debug!(run_id = %self.run_id, "Dropping {} event on closed transport", event.label());
            return false;
        };
        if tx.send(event).is_err() {
            debug!(run_id = %self.run_id, "Consumer disconnected, cancelling run");
            self.cancel.cancel();
            return false;
        }
        true
    }

    /// Stops the heartbeat and releases the send half. Idempotent.
    pub fn close(&mut self) {
        if self.tx.take().is_some() {
            self.heartbeat_stop.cancel();
            debug!(run_id = %self.run_id, "Event stream closed");
        }
    }
}

impl Drop for StreamTransport {
    fn drop(&mut self) {
        self.close();
    }
}

/// Consumer half. Yields events in emission order and ends after the
/// first terminal event, so nothing (not even a heartbeat) follows
/// `complete` or `error`.
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<PipelineEvent>,
    finished: bool,
    _disconnect: DropGuard,
}

impl EventReceiver {
    /// Encodes the stream as `event:`/`data:` frames for an HTTP body.
    pub fn into_frames(self) -> impl Stream<Item = Result<Bytes, Infallible>> + Send {
        self.filter_map(|event| async move {
            match encode_frame(&event) {
                Ok(frame) => Some(Ok(Bytes::from(frame))),
                Err(e) => {
                    error!("Failed to encode {} event: {e}", event.label());
                    None
                }
            }
        })
    }
}

impl Stream for EventReceiver {
    type Item = PipelineEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }
        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(event)) => {
                if event.is_terminal() {
                    this.finished = true;
                    this.rx.close();
                }
                Poll::Ready(Some(event))
            }
            Poll::Ready(None) => {
                this.finished = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
