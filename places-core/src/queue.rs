use std::{future::Future, pin::Pin, time::Duration};

use tokio::{
    sync::{mpsc, oneshot},
    time::{Instant, sleep_until},
};
use tracing::{debug, error};

use crate::error::PlacesError;

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

/// FIFO of outbound requests with a minimum spacing between dispatches.
///
/// A single worker task owns the receiving end of the channel, so at most one
/// queued request is in flight at any time no matter how many callers enqueue
/// concurrently. The worker stops once every handle has been dropped and the
/// backlog is drained.
#[derive(Debug)]
pub struct RequestQueue {
    tx: mpsc::UnboundedSender<Job>,
}

impl RequestQueue {
    /// Spawns the worker on the current tokio runtime.
    pub fn new(delay: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(drain(rx, delay));
        Self { tx }
    }

    /// Append `task` to the queue and wait for its outcome.
    ///
    /// The task does not start before it reaches the head of the queue and the
    /// spacing since the previous dispatch has elapsed. Its error settles only
    /// its own caller.
    pub async fn enqueue<T, F>(&self, task: F) -> Result<T, PlacesError>
    where
        T: Send + 'static,
        F: Future<Output = Result<T, PlacesError>> + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();

        let job: Job = Box::pin(async move {
            // the caller may have given up waiting; nothing to do then
            let _ = reply_tx.send(task.await);
        });

        self.tx.send(job).map_err(|_| PlacesError::QueueClosed)?;
        reply_rx.await.map_err(|_| PlacesError::QueueClosed)?
    }
}

async fn drain(mut rx: mpsc::UnboundedReceiver<Job>, delay: Duration) {
    let mut last_dispatch: Option<Instant> = None;

    while let Some(job) = rx.recv().await {
        if let Some(last) = last_dispatch {
            let ready_at = last + delay;
            let now = Instant::now();
            if now < ready_at {
                debug!(wait_ms = (ready_at - now).as_millis() as u64, "rate limiting queued request");
                sleep_until(ready_at).await;
            }
        }

        last_dispatch = Some(Instant::now());

        // a panicking job drops its reply sender, which the caller sees as QueueClosed
        if let Err(e) = tokio::spawn(job).await {
            error!("queued request aborted: {e}");
        }
    }

    debug!("request queue drained and closed");
}
