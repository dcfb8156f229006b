use eventsource_stream::{Event, Eventsource};
use futures::{Stream, StreamExt};
use reqwest::{Client, Url, header};
use serde::Deserialize;
use snafu::{ResultExt, ensure};
use tokio::sync::oneshot;
use turnstream_chat::transport::{EmptyMessageSnafu, TransportError};
use turnstream_chat::{
    CHANNEL_ENDED_EARLY, ChatTransport, TransportResult, TurnEvent, TurnEventSender, TurnId,
    TurnRequest, TurnStreamHandle, TurnWorker, make_turn_channel,
};

use super::config::SseConfig;
use super::error::{
    BuildClientSnafu, DecodeSnafu, InvalidBaseUrlSnafu, RequestSnafu, SseError, SseResult,
    StatusSnafu,
};

pub const SSE_TRANSPORT_NAME: &str = "sse";

const EVENT_STREAM_MIME: &str = "text/event-stream";
const MESSAGE_EVENT: &str = "message";
const DONE_EVENT: &str = "done";
const ERROR_EVENT: &str = "error";

/// Body of the server's health endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerHealth {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub model: Option<String>,
}

/// Opens one `GET` event stream per turn against a chat server.
pub struct SseTransport {
    config: SseConfig,
    client: Client,
}

impl SseTransport {
    pub fn new(config: SseConfig) -> SseResult<Self> {
        let client = Client::builder().build().context(BuildClientSnafu {
            stage: "build-client",
        })?;
        Self::with_client(config, client)
    }

    /// Uses a caller-configured HTTP client (proxy, TLS, timeouts).
    pub fn with_client(config: SseConfig, client: Client) -> SseResult<Self> {
        let config = config.normalized();
        let base_url = parse_url(&config.base_url, "parse-base-url")?;

        ensure!(
            matches!(base_url.scheme(), "http" | "https"),
            InvalidBaseUrlSnafu {
                stage: "check-base-url-scheme",
                base_url: config.base_url.clone(),
                details: format!("unsupported scheme '{}'", base_url.scheme()),
            }
        );

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &SseConfig {
        &self.config
    }

    /// Full stream URL for one user message.
    pub fn stream_url(&self, message: &str) -> SseResult<Url> {
        let mut url = self.endpoint(&self.config.stream_path, "build-stream-url")?;
        url.query_pairs_mut()
            .append_pair(&self.config.message_param, message);
        Ok(url)
    }

    fn endpoint(&self, path: &str, stage: &'static str) -> SseResult<Url> {
        parse_url(&format!("{}{}", self.config.base_url, path), stage)
    }

    pub async fn check_health(&self) -> SseResult<ServerHealth> {
        let url = self.endpoint(&self.config.health_path, "build-health-url")?;
        let response = self.client.get(url).send().await.context(RequestSnafu {
            stage: "send-health-request",
        })?;

        let status = response.status();
        let body = response.text().await.context(RequestSnafu {
            stage: "read-health-response",
        })?;

        if !status.is_success() {
            return StatusSnafu {
                stage: "health-http-status",
                status: status.as_u16(),
                body,
            }
            .fail();
        }

        serde_json::from_str(&body).context(DecodeSnafu {
            stage: "parse-health-response",
        })
    }

    async fn open_stream(client: &Client, url: Url) -> SseResult<reqwest::Response> {
        let response = client
            .get(url)
            .header(header::ACCEPT, EVENT_STREAM_MIME)
            .send()
            .await
            .context(RequestSnafu {
                stage: "open-stream",
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return StatusSnafu {
                stage: "stream-http-status",
                status: status.as_u16(),
                body,
            }
            .fail();
        }

        Ok(response)
    }

    async fn run_turn_worker(
        client: Client,
        url: Url,
        turn: TurnId,
        event_tx: TurnEventSender,
        mut cancel_rx: oneshot::Receiver<()>,
    ) {
        let opened = tokio::select! {
            _ = &mut cancel_rx => {
                tracing::debug!(turn = %turn, "turn cancelled while connecting");
                return;
            }
            opened = Self::open_stream(&client, url) => opened,
        };

        let response = match opened {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(turn = %turn, error = %error, "failed to open event stream");
                let _ = event_tx.send(TurnEvent::error(turn, error.to_string()));
                return;
            }
        };

        forward_events(turn, response.bytes_stream(), event_tx, cancel_rx).await;
    }
}

impl ChatTransport for SseTransport {
    fn name(&self) -> &str {
        SSE_TRANSPORT_NAME
    }

    fn open(&self, request: TurnRequest) -> TransportResult<TurnStreamHandle> {
        ensure!(
            !request.message.trim().is_empty(),
            EmptyMessageSnafu {
                stage: "sse-open",
                turn: request.turn,
            }
        );

        let url = self
            .stream_url(&request.message)
            .map_err(|error| TransportError::Open {
                stage: "sse-stream-url",
                turn: request.turn,
                details: error.to_string(),
            })?;

        let (event_tx, channel, cancel_rx) = make_turn_channel(request.turn);
        let worker: TurnWorker = Box::pin(Self::run_turn_worker(
            self.client.clone(),
            url,
            request.turn,
            event_tx,
            cancel_rx,
        ));

        Ok(TurnStreamHandle { channel, worker })
    }
}

/// Decodes an SSE byte stream into turn events until a terminal event,
/// cancellation, or the end of the body.
///
/// The end of the body completes the turn only if a `done` frame was seen on
/// the wire; otherwise the turn fails with [`CHANNEL_ENDED_EARLY`].
pub async fn forward_events<S, B, E>(
    turn: TurnId,
    stream: S,
    event_tx: TurnEventSender,
    mut cancel_rx: oneshot::Receiver<()>,
) where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut done_frame = DoneFrameScanner::default();
    let body = stream.inspect(|chunk| {
        if let Ok(bytes) = chunk {
            done_frame.feed(bytes.as_ref());
        }
    });
    let mut events = Box::pin(body.eventsource());

    loop {
        tokio::select! {
            _ = &mut cancel_rx => {
                tracing::debug!(turn = %turn, "event stream cancelled");
                return;
            }
            next = events.next() => {
                match next {
                    Some(Ok(event)) => {
                        let Some(mapped) = map_sse_event(turn, event) else {
                            continue;
                        };
                        let terminal = mapped.is_terminal();
                        if event_tx.send(mapped).is_err() || terminal {
                            return;
                        }
                    }
                    Some(Err(source)) => {
                        let error = SseError::Stream {
                            stage: "read-event",
                            details: source.to_string(),
                        };
                        tracing::warn!(turn = %turn, error = %error, "event stream failed");
                        let _ = event_tx.send(TurnEvent::error(turn, error.to_string()));
                        return;
                    }
                    None => break,
                }
            }
        }
    }
    drop(events);

    let last = if done_frame.seen {
        TurnEvent::done(turn)
    } else {
        tracing::warn!(turn = %turn, "event stream closed without a done frame");
        TurnEvent::error(turn, CHANNEL_ENDED_EARLY)
    };
    let _ = event_tx.send(last);
}

/// Watches raw body lines for an `event: done` field.
///
/// A frame that only names its event has no data, so the SSE decoder never
/// dispatches it.
#[derive(Debug, Default)]
struct DoneFrameScanner {
    line: Vec<u8>,
    seen: bool,
}

impl DoneFrameScanner {
    fn feed(&mut self, chunk: &[u8]) {
        if self.seen {
            return;
        }
        for &byte in chunk {
            if byte == b'\n' || byte == b'\r' {
                self.seen = is_done_field(&self.line);
                self.line.clear();
                if self.seen {
                    return;
                }
            } else {
                self.line.push(byte);
            }
        }
    }
}

fn is_done_field(line: &[u8]) -> bool {
    let Some(value) = line.strip_prefix(b"event:") else {
        return false;
    };
    value.strip_prefix(b" ").unwrap_or(value) == DONE_EVENT.as_bytes()
}

fn map_sse_event(turn: TurnId, event: Event) -> Option<TurnEvent> {
    match event.event.as_str() {
        DONE_EVENT => Some(TurnEvent::done(turn)),
        ERROR_EVENT => {
            let reason = if event.data.is_empty() {
                "server reported an error".to_string()
            } else {
                event.data
            };
            Some(TurnEvent::error(turn, reason))
        }
        "" | MESSAGE_EVENT if !event.data.is_empty() => Some(TurnEvent::delta(turn, event.data)),
        "" | MESSAGE_EVENT => None,
        other => {
            tracing::trace!(turn = %turn, event = other, "ignoring unknown event type");
            None
        }
    }
}

fn parse_url(raw: &str, stage: &'static str) -> SseResult<Url> {
    Url::parse(raw).map_err(|source| SseError::InvalidBaseUrl {
        stage,
        base_url: raw.to_string(),
        details: source.to_string(),
    })
}
