use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Reserved display identity of the in-progress assistant message.
pub const PROVISIONAL_KEY: &str = "ai-current";

/// Stable, time-ordered identifier of a finalized message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(Uuid);

impl MessageId {
    pub fn new_v7() -> Self {
        Self(Uuid::now_v7())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, formatter)
    }
}

impl FromStr for MessageId {
    type Err = uuid::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        raw.parse().map(Self)
    }
}

/// Identity of a message inside the conversation store.
///
/// `Provisional` is shared by every in-progress assistant reply, so the store
/// admits at most one such message at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKey {
    Provisional,
    Final(MessageId),
}

impl MessageKey {
    pub fn is_provisional(&self) -> bool {
        matches!(self, Self::Provisional)
    }

    pub fn final_id(&self) -> Option<MessageId> {
        match self {
            Self::Provisional => None,
            Self::Final(id) => Some(*id),
        }
    }
}

impl fmt::Display for MessageKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provisional => formatter.write_str(PROVISIONAL_KEY),
            Self::Final(id) => write!(formatter, "{id}"),
        }
    }
}

/// Identifier for one conversation turn.
///
/// Allocated per `send`; events carrying an older turn are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TurnId(pub u64);

impl TurnId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for TurnId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "turn-{}", self.0)
    }
}

/// Chat speaker role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub key: MessageKey,
    pub role: Role,
    pub text: String,
    pub at: DateTime<Utc>,
}

impl Message {
    pub fn new(key: MessageKey, role: Role, text: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            key,
            role,
            text: text.into(),
            at,
        }
    }

    /// Creates a finalized user message with a fresh identifier.
    pub fn user(text: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self::new(
            MessageKey::Final(MessageId::new_v7()),
            Role::User,
            text,
            at,
        )
    }

    /// Creates the in-progress assistant placeholder.
    pub fn provisional(text: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self::new(MessageKey::Provisional, Role::Assistant, text, at)
    }

    pub fn is_provisional(&self) -> bool {
        self.key.is_provisional()
    }
}
