use snafu::Snafu;

pub type SseResult<T> = Result<T, SseError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SseError {
    #[snafu(display("base URL '{base_url}' is invalid: {details}"))]
    InvalidBaseUrl {
        stage: &'static str,
        base_url: String,
        details: String,
    },
    #[snafu(display("failed to build HTTP client on `{stage}`: {source}"))]
    BuildClient {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("request failed on `{stage}`: {source}"))]
    Request {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("server returned status {status}: {body}"))]
    Status {
        stage: &'static str,
        status: u16,
        body: String,
    },
    #[snafu(display("event stream failed on `{stage}`: {details}"))]
    Stream {
        stage: &'static str,
        details: String,
    },
    #[snafu(display("failed to decode server response on `{stage}`: {source}"))]
    Decode {
        stage: &'static str,
        source: serde_json::Error,
    },
}
