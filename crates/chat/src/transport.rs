use futures::future::BoxFuture;
use snafu::Snafu;
use tokio::sync::{mpsc, oneshot};

use crate::events::TurnEvent;
use crate::message::TurnId;

/// What the transport is asked to stream for one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnRequest {
    pub turn: TurnId,
    pub message: String,
}

impl TurnRequest {
    pub fn new(turn: TurnId, message: impl Into<String>) -> Self {
        Self {
            turn,
            message: message.into(),
        }
    }
}

pub type TurnWorker = BoxFuture<'static, ()>;
pub type TurnEventSender = mpsc::UnboundedSender<TurnEvent>;
pub type TransportResult<T> = Result<T, TransportError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum TransportError {
    #[snafu(display("turn {turn} has an empty message"))]
    EmptyMessage { stage: &'static str, turn: TurnId },
    #[snafu(display("failed to open channel for turn {turn} on `{stage}`: {details}"))]
    Open {
        stage: &'static str,
        turn: TurnId,
        details: String,
    },
}

/// Receiving end of one turn's stream plus its cancellation switch.
pub struct TurnChannel {
    turn: TurnId,
    events: mpsc::UnboundedReceiver<TurnEvent>,
    cancel_tx: Option<oneshot::Sender<()>>,
    closed: bool,
}

/// An opened channel and the future that feeds it.
///
/// The worker must be spawned for events to flow; it should stop once the
/// cancel receiver paired with the channel resolves.
pub struct TurnStreamHandle {
    pub channel: TurnChannel,
    pub worker: TurnWorker,
}

impl TurnChannel {
    pub(crate) fn new(
        turn: TurnId,
        events: mpsc::UnboundedReceiver<TurnEvent>,
        cancel_tx: oneshot::Sender<()>,
    ) -> Self {
        Self {
            turn,
            events,
            cancel_tx: Some(cancel_tx),
            closed: false,
        }
    }

    pub fn turn(&self) -> TurnId {
        self.turn
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Waits for the next event. Returns `None` once closed or when the
    /// producer has gone away.
    pub async fn recv(&mut self) -> Option<TurnEvent> {
        if self.closed {
            return None;
        }
        self.events.recv().await
    }

    pub fn try_recv(&mut self) -> Option<TurnEvent> {
        if self.closed {
            return None;
        }
        self.events.try_recv().ok()
    }

    /// Signals the worker to stop and discards anything still queued.
    ///
    /// Safe to call repeatedly; returns `true` only for the call that delivered
    /// the cancel signal to a live worker.
    pub fn close(&mut self) -> bool {
        self.closed = true;
        self.events.close();
        self.cancel_tx
            .take()
            .map(|tx| tx.send(()).is_ok())
            .unwrap_or(false)
    }
}

impl Drop for TurnChannel {
    fn drop(&mut self) {
        if let Some(cancel_tx) = self.cancel_tx.take() {
            let _ = cancel_tx.send(());
        }
    }
}

/// Source of per-turn streaming channels.
pub trait ChatTransport: Send + Sync {
    fn name(&self) -> &str;
    fn open(&self, request: TurnRequest) -> TransportResult<TurnStreamHandle>;
}

/// Builds the plumbing a transport needs for one turn: the sender its worker
/// writes to, the channel handed to the controller, and the cancel receiver.
pub fn make_turn_channel(turn: TurnId) -> (TurnEventSender, TurnChannel, oneshot::Receiver<()>) {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (cancel_tx, cancel_rx) = oneshot::channel();
    (event_tx, TurnChannel::new(turn, event_rx, cancel_tx), cancel_rx)
}
