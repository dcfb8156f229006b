use snafu::Snafu;
use turnstream_sse::SseError;

use crate::settings::SettingsError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum AppError {
    #[snafu(display("failed to load settings"))]
    Settings { source: SettingsError },
    #[snafu(display("failed to set up the stream transport on `{stage}`"))]
    Transport {
        stage: &'static str,
        source: SseError,
    },
    #[snafu(display("terminal i/o failed on `{stage}`"))]
    Terminal {
        stage: &'static str,
        source: std::io::Error,
    },
}
