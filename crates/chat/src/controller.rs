use chrono::Utc;
use tokio::task::JoinHandle;

use crate::events::{TurnEvent, TurnEventPayload, TurnUpdate};
use crate::message::{Message, MessageId, TurnId};
use crate::store::ConversationStore;
use crate::transport::{ChatTransport, TurnChannel, TurnRequest, TurnStreamHandle};

/// Reason reported when a channel closes without a terminal event.
pub const CHANNEL_ENDED_EARLY: &str = "stream ended before a terminal event";

/// Coordinator-level metadata for the single in-flight turn.
struct ActiveTurn {
    turn: TurnId,
    channel: TurnChannel,
    worker: Option<JoinHandle<()>>,
}

impl ActiveTurn {
    fn close(&mut self) {
        self.channel.close();
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}

enum ControllerState {
    Idle,
    Streaming(ActiveTurn),
}

/// Observable summary of the controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerStatus {
    Idle,
    Streaming(TurnId),
}

/// Owns the conversation store and at most one streaming channel.
///
/// Every mutation goes through `&mut self`, so a single event loop drives the
/// whole lifecycle. Events are applied only while their turn is still the live
/// one; anything from a closed or superseded channel is dropped.
pub struct StreamController<T> {
    transport: T,
    store: ConversationStore,
    state: ControllerState,
    buffer: String,
    next_turn_id: u64,
    disposed: bool,
}

impl<T: ChatTransport> StreamController<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            store: ConversationStore::new(),
            state: ControllerState::Idle,
            buffer: String::new(),
            next_turn_id: 1,
            disposed: false,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn messages(&self) -> &[Message] {
        self.store.messages()
    }

    pub fn status(&self) -> ControllerStatus {
        match &self.state {
            ControllerState::Idle => ControllerStatus::Idle,
            ControllerState::Streaming(active) => ControllerStatus::Streaming(active.turn),
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Starts a new turn for `text`, superseding any turn still streaming.
    ///
    /// Whitespace-only input is ignored. Transport failures never surface here:
    /// they are logged and leave the controller idle.
    pub fn send(&mut self, text: &str) -> Option<TurnId> {
        if self.disposed {
            tracing::debug!("ignoring send on a disposed controller");
            return None;
        }

        if text.trim().is_empty() {
            return None;
        }

        self.store.append(Message::user(text, Utc::now()));

        if let ControllerState::Streaming(active) = &self.state {
            tracing::debug!(turn = %active.turn, "superseding in-flight turn");
            self.close_active();
        }

        let turn = self.alloc_turn_id();
        match self.transport.open(TurnRequest::new(turn, text)) {
            Ok(handle) => {
                self.start_turn(turn, handle);
                Some(turn)
            }
            Err(error) => {
                tracing::warn!(
                    turn = %turn,
                    transport = self.transport.name(),
                    error = %error,
                    "failed to open turn channel"
                );
                Some(turn)
            }
        }
    }

    fn start_turn(&mut self, turn: TurnId, handle: TurnStreamHandle) {
        let TurnStreamHandle { channel, worker } = handle;
        let worker = tokio::spawn(worker);

        tracing::debug!(turn = %turn, transport = self.transport.name(), "turn channel opened");
        self.buffer.clear();
        self.state = ControllerState::Streaming(ActiveTurn {
            turn,
            channel,
            worker: Some(worker),
        });
    }

    /// Waits for the next event of the live turn.
    ///
    /// Returns `None` when idle. A channel that ends without `Done`/`Error`
    /// is reported as a failure of its turn.
    pub async fn next_event(&mut self) -> Option<TurnEvent> {
        let ControllerState::Streaming(active) = &mut self.state else {
            return None;
        };

        match active.channel.recv().await {
            Some(event) => Some(event),
            None => Some(TurnEvent::error(active.turn, CHANNEL_ENDED_EARLY)),
        }
    }

    /// Receives and applies one event. Returns `None` when idle.
    pub async fn pump(&mut self) -> Option<TurnUpdate> {
        let event = self.next_event().await?;
        Some(self.handle_event(event))
    }

    /// Applies one event to the store if it belongs to the live turn.
    pub fn handle_event(&mut self, event: TurnEvent) -> TurnUpdate {
        if !self.is_current(event.turn) {
            tracing::trace!(turn = %event.turn, "dropping event from inactive turn");
            return TurnUpdate::Ignored;
        }

        let turn = event.turn;
        match event.payload {
            TurnEventPayload::Delta(fragment) => {
                if fragment.is_empty() {
                    return TurnUpdate::Ignored;
                }
                self.buffer.push_str(&fragment);
                self.store
                    .upsert_provisional(self.buffer.clone(), Utc::now());
                TurnUpdate::Fragment {
                    turn,
                    len: self.buffer.len(),
                }
            }
            TurnEventPayload::Done => {
                // A provisional reply left by an abandoned turn stays unfinalized.
                let message = if self.buffer.is_empty() {
                    None
                } else {
                    let id = MessageId::new_v7();
                    self.store.finalize_provisional(id).then_some(id)
                };
                self.close_active();
                tracing::debug!(turn = %turn, finalized = message.is_some(), "turn completed");
                TurnUpdate::Completed { turn, message }
            }
            TurnEventPayload::Error(reason) => {
                self.close_active();
                tracing::warn!(turn = %turn, error = %reason, "turn aborted by transport");
                TurnUpdate::Failed { turn, reason }
            }
        }
    }

    /// Tears down the live channel without finalizing. Later sends and events
    /// are ignored.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }

        if let ControllerState::Streaming(active) = &self.state {
            tracing::debug!(turn = %active.turn, "disposing controller with turn in flight");
        }
        self.close_active();
        self.disposed = true;
    }

    fn is_current(&self, turn: TurnId) -> bool {
        !self.disposed
            && matches!(&self.state, ControllerState::Streaming(active) if active.turn == turn)
    }

    fn close_active(&mut self) {
        if let ControllerState::Streaming(mut active) =
            std::mem::replace(&mut self.state, ControllerState::Idle)
        {
            active.close();
        }
        self.buffer.clear();
    }

    fn alloc_turn_id(&mut self) -> TurnId {
        let id = TurnId::new(self.next_turn_id);
        self.next_turn_id = self.next_turn_id.saturating_add(1);
        id
    }
}

impl<T> Drop for StreamController<T> {
    fn drop(&mut self) {
        if let ControllerState::Streaming(active) = &mut self.state {
            active.close();
        }
    }
}
