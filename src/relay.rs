use crate::ai_sdk::StreamChunk;
use crate::error::AiError;
use futures::{Stream, StreamExt};
use std::future::Future;
use tokio::sync::mpsc;
use tracing::Instrument;
use uuid::Uuid;

const RELAY_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Open,
    Completed,
    Errored,
}

/// What the consumer sees: fragments in arrival order, then at most one failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    Fragment(String),
    Failed(String),
}

#[derive(Debug)]
enum Signal {
    Fragment(String),
    Complete,
    Fail(String),
}

/// Returned by [`RelaySender::push`] once the consumer has gone away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayClosed;

/// Creates a single-producer/single-consumer relay.
pub fn channel() -> (RelaySender, RelayReceiver) {
    let (tx, rx) = mpsc::channel(RELAY_CAPACITY);
    (
        RelaySender { tx },
        RelayReceiver {
            rx,
            state: RelayState::Open,
        },
    )
}

pub struct RelaySender {
    tx: mpsc::Sender<Signal>,
}

impl RelaySender {
    pub async fn push(&self, fragment: String) -> Result<(), RelayClosed> {
        self.tx
            .send(Signal::Fragment(fragment))
            .await
            .map_err(|_| RelayClosed)
    }

    // Terminal transitions consume the sender, so nothing can follow them.
    pub async fn complete(self) {
        let _ = self.tx.send(Signal::Complete).await;
    }

    pub async fn fail(self, message: impl Into<String>) {
        let _ = self.tx.send(Signal::Fail(message.into())).await;
    }

    /// Resolves once the receiving side has been dropped.
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}

pub struct RelayReceiver {
    rx: mpsc::Receiver<Signal>,
    state: RelayState,
}

impl RelayReceiver {
    pub fn state(&self) -> RelayState {
        self.state
    }

    /// Next event, or `None` once the relay is no longer open.
    pub async fn recv(&mut self) -> Option<RelayEvent> {
        if self.state != RelayState::Open {
            return None;
        }

        match self.rx.recv().await {
            Some(Signal::Fragment(fragment)) => Some(RelayEvent::Fragment(fragment)),
            Some(Signal::Complete) => {
                self.state = RelayState::Completed;
                None
            }
            Some(Signal::Fail(message)) => {
                self.state = RelayState::Errored;
                Some(RelayEvent::Failed(message))
            }
            None => {
                self.state = RelayState::Errored;
                Some(RelayEvent::Failed(
                    "AI stream ended unexpectedly".to_string(),
                ))
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = RelayEvent> + Send + 'static {
        futures::stream::unfold(self, |mut receiver| async move {
            let event = receiver.recv().await;
            if event.is_none() {
                tracing::debug!(state = ?receiver.state(), "relay closed");
            }
            event.map(|event| (event, receiver))
        })
    }
}

/// Starts a relay session on its own task.
///
/// `upstream` opens the provider stream; its chunks are pushed to the returned
/// receiver until the upstream ends, fails, or the receiver is dropped. In the
/// last case the upstream stream is dropped too, cancelling the request.
pub fn spawn_session<F, S>(upstream: F) -> RelayReceiver
where
    F: Future<Output = Result<S, AiError>> + Send + 'static,
    S: Stream<Item = Result<StreamChunk, AiError>> + Send + 'static,
{
    let (sender, receiver) = channel();
    let span = tracing::info_span!("relay", session = %Uuid::new_v4());
    tokio::spawn(run_session(upstream, sender).instrument(span));
    receiver
}

async fn run_session<F, S>(upstream: F, sender: RelaySender)
where
    F: Future<Output = Result<S, AiError>>,
    S: Stream<Item = Result<StreamChunk, AiError>>,
{
    let chunks = match upstream.await {
        Ok(chunks) => chunks,
        Err(err) => {
            tracing::warn!(error = %err, "could not open AI stream");
            sender.fail(err.to_string()).await;
            return;
        }
    };
    futures::pin_mut!(chunks);

    let mut relayed = 0usize;
    loop {
        let next = tokio::select! {
            _ = sender.closed() => {
                tracing::debug!(relayed, "downstream disconnected, dropping upstream");
                return;
            }
            next = chunks.next() => next,
        };

        match next {
            Some(Ok(chunk)) => {
                if chunk.is_terminal() {
                    tracing::debug!(finish_reason = ?chunk.finish_reason, "upstream finished");
                }
                let Some(fragment) = chunk.fragment().map(str::to_owned) else {
                    continue;
                };
                if sender.push(fragment).await.is_err() {
                    tracing::debug!(relayed, "downstream disconnected, dropping upstream");
                    return;
                }
                relayed += 1;
            }
            Some(Err(err)) => {
                tracing::warn!(error = %err, relayed, "AI stream failed");
                sender.fail(err.to_string()).await;
                return;
            }
            None => break,
        }
    }

    tracing::debug!(relayed, "AI stream completed");
    sender.complete().await;
}
