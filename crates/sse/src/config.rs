use serde::{Deserialize, Serialize};

/// Default server address of a locally running chat backend.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_STREAM_PATH: &str = "/api/chat/stream";
/// Query parameter carrying the user message.
pub const DEFAULT_MESSAGE_PARAM: &str = "message";
pub const DEFAULT_HEALTH_PATH: &str = "/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SseConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_stream_path")]
    pub stream_path: String,
    #[serde(default = "default_message_param")]
    pub message_param: String,
    #[serde(default = "default_health_path")]
    pub health_path: String,
}

impl Default for SseConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            stream_path: default_stream_path(),
            message_param: default_message_param(),
            health_path: default_health_path(),
        }
    }
}

impl SseConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Trims every field and falls back to defaults for blanks. Paths always
    /// start with `/`.
    pub fn normalized(mut self) -> Self {
        self.base_url = non_blank(self.base_url, default_base_url)
            .trim_end_matches('/')
            .to_string();
        self.stream_path = rooted(non_blank(self.stream_path, default_stream_path));
        self.message_param = non_blank(self.message_param, default_message_param);
        self.health_path = rooted(non_blank(self.health_path, default_health_path));
        self
    }
}

fn non_blank(value: String, fallback: fn() -> String) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback()
    } else {
        trimmed.to_string()
    }
}

fn rooted(path: String) -> String {
    if path.starts_with('/') {
        path
    } else {
        format!("/{path}")
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_stream_path() -> String {
    DEFAULT_STREAM_PATH.to_string()
}

fn default_message_param() -> String {
    DEFAULT_MESSAGE_PARAM.to_string()
}

fn default_health_path() -> String {
    DEFAULT_HEALTH_PATH.to_string()
}
