//! StreamChannel: the conduit between a generation task and its consumer.
//!
//! A bounded tokio mpsc queue carries [`StreamFragment`]s. The sending half
//! owns the terminal contract (exactly one `Done` or `Error`, later sends
//! ignored). The receiving half is a `Stream`; dropping it cancels the
//! shared [`CancellationToken`], which is how a consumer disconnect reaches
//! the generation task.

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use confab_types::chat::StreamFragment;
use confab_types::llm::Usage;

/// Why a fragment could not be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("consumer disconnected")]
    Disconnected,

    #[error("consumer stalled for {0:?}")]
    Stalled(Duration),
}

struct Shared {
    terminated: AtomicBool,
    cancel: CancellationToken,
}

pub struct StreamChannel;

impl StreamChannel {
    /// Create a channel holding at most `capacity` undelivered fragments.
    ///
    /// A send that cannot enqueue within `send_timeout` treats the
    /// consumer as stalled and cancels the channel.
    pub fn new(capacity: usize, send_timeout: Duration) -> (StreamSender, StreamReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let shared = Arc::new(Shared {
            terminated: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        });
        (
            StreamSender {
                tx,
                shared: shared.clone(),
                send_timeout,
            },
            StreamReceiver { rx, shared },
        )
    }
}

#[derive(Clone)]
pub struct StreamSender {
    tx: mpsc::Sender<StreamFragment>,
    shared: Arc<Shared>,
    send_timeout: Duration,
}

impl StreamSender {
    /// Enqueue a fragment.
    ///
    /// After termination this is a no-op returning `Ok`. Terminal fragments
    /// are routed through the same exactly-once gate as [`Self::complete`]
    /// and [`Self::error`].
    pub async fn send(&self, fragment: StreamFragment) -> Result<(), SendError> {
        if fragment.is_terminal() {
            return self.terminate(fragment).await;
        }
        if self.is_terminated() {
            return Ok(());
        }
        self.deliver(fragment).await
    }

    /// Send the `Done` marker with usage and elapsed time.
    pub async fn complete(&self, usage: Usage, elapsed: Duration) -> Result<(), SendError> {
        self.terminate(StreamFragment::Done {
            prompt_tokens: usage.input_tokens,
            completion_tokens: usage.output_tokens,
            total_tokens: usage.total(),
            elapsed_ms: elapsed.as_millis() as u64,
        })
        .await
    }

    /// Send the `Error` marker.
    pub async fn error(&self, message: impl Into<String>) -> Result<(), SendError> {
        self.terminate(StreamFragment::Error {
            message: message.into(),
        })
        .await
    }

    pub fn is_terminated(&self) -> bool {
        self.shared.terminated.load(Ordering::Acquire)
    }

    /// Token cancelled when the consumer goes away or the channel is
    /// cancelled explicitly.
    pub fn cancellation(&self) -> CancellationToken {
        self.shared.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    /// Abandon the exchange; no further fragments will be delivered.
    pub fn cancel(&self) {
        self.shared.terminated.store(true, Ordering::Release);
        self.shared.cancel.cancel();
    }

    async fn terminate(&self, fragment: StreamFragment) -> Result<(), SendError> {
        if self.shared.terminated.swap(true, Ordering::AcqRel) {
            debug!("ignoring fragment after stream termination");
            return Ok(());
        }
        self.deliver(fragment).await
    }

    async fn deliver(&self, fragment: StreamFragment) -> Result<(), SendError> {
        if self.shared.cancel.is_cancelled() {
            return Err(SendError::Disconnected);
        }
        match tokio::time::timeout(self.send_timeout, self.tx.send(fragment)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => {
                self.shared.cancel.cancel();
                Err(SendError::Disconnected)
            }
            Err(_) => {
                warn!(timeout = ?self.send_timeout, "stream consumer stalled, cancelling");
                self.cancel();
                Err(SendError::Stalled(self.send_timeout))
            }
        }
    }
}

/// Consumer half. Yields fragments in send order and ends after the
/// terminal fragment once the generation task has finished.
pub struct StreamReceiver {
    rx: mpsc::Receiver<StreamFragment>,
    shared: Arc<Shared>,
}

impl StreamReceiver {
    pub async fn recv(&mut self) -> Option<StreamFragment> {
        self.rx.recv().await
    }

    /// Collect every remaining fragment.
    pub async fn collect_all(mut self) -> Vec<StreamFragment> {
        let mut fragments = Vec::new();
        while let Some(fragment) = self.rx.recv().await {
            fragments.push(fragment);
        }
        fragments
    }
}

impl Stream for StreamReceiver {
    type Item = StreamFragment;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for StreamReceiver {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
    }
}
