//! Server-sent-events transport for the turn stream controller.

mod adapter;
mod config;
mod error;

pub use adapter::{ServerHealth, SseTransport, forward_events, SSE_TRANSPORT_NAME};
pub use config::{
    DEFAULT_BASE_URL, DEFAULT_HEALTH_PATH, DEFAULT_MESSAGE_PARAM, DEFAULT_STREAM_PATH, SseConfig,
};
pub use error::{SseError, SseResult};
