use crate::message::{MessageId, TurnId};

/// Transport-agnostic payload of one streamed turn event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEventPayload {
    /// Fragment to concatenate onto the reply, in arrival order.
    Delta(String),
    Done,
    Error(String),
}

/// A payload tagged with the turn whose channel produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnEvent {
    pub turn: TurnId,
    pub payload: TurnEventPayload,
}

impl TurnEvent {
    pub fn delta(turn: TurnId, text: impl Into<String>) -> Self {
        Self {
            turn,
            payload: TurnEventPayload::Delta(text.into()),
        }
    }

    pub fn done(turn: TurnId) -> Self {
        Self {
            turn,
            payload: TurnEventPayload::Done,
        }
    }

    pub fn error(turn: TurnId, message: impl Into<String>) -> Self {
        Self {
            turn,
            payload: TurnEventPayload::Error(message.into()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.payload,
            TurnEventPayload::Done | TurnEventPayload::Error(_)
        )
    }
}

/// Outcome of feeding one event to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnUpdate {
    /// The event belonged to a closed or superseded turn, or carried nothing.
    Ignored,
    /// The provisional reply grew; `len` is its new byte length.
    Fragment { turn: TurnId, len: usize },
    /// The turn finished cleanly. `message` is `None` when no text ever arrived.
    Completed {
        turn: TurnId,
        message: Option<MessageId>,
    },
    /// The turn was aborted by the transport; partial text is left unfinalized.
    Failed { turn: TurnId, reason: String },
}
