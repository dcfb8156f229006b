#![deny(unsafe_code)]

//! Conversation state and the per-turn stream controller of the chat client.
//!
//! Transports plug in through [`ChatTransport`]; the controller owns the
//! [`ConversationStore`] and is its only writer.

pub mod controller;
/// Event contracts between transports, the controller and presentation.
pub mod events;
/// Message identities and the message model.
pub mod message;
pub mod store;
pub mod transport;

pub use controller::{CHANNEL_ENDED_EARLY, ControllerStatus, StreamController};
pub use events::{TurnEvent, TurnEventPayload, TurnUpdate};
pub use message::{Message, MessageId, MessageKey, PROVISIONAL_KEY, Role, TurnId};
pub use store::ConversationStore;
pub use transport::{
    ChatTransport, TransportError, TransportResult, TurnChannel, TurnEventSender, TurnRequest,
    TurnStreamHandle, TurnWorker, make_turn_channel,
};
