use std::path::PathBuf;

use clap::Parser;
use snafu::ResultExt;
use tracing_subscriber::EnvFilter;
use turnstream::error::{SettingsSnafu, TerminalSnafu, TransportSnafu};
use turnstream::settings::CONFIG_PATH_ENV;
use turnstream::{AppError, AppSettings, TerminalView};
use turnstream_chat::StreamController;
use turnstream_sse::SseTransport;

/// Terminal chat client that streams replies from a server-sent-events endpoint.
#[derive(Debug, Parser)]
#[command(name = "turnstream", version)]
struct Cli {
    /// Settings file; defaults to the per-user config directory.
    #[arg(long, env = CONFIG_PATH_ENV)]
    config: Option<PathBuf>,
    /// Overrides `server.base_url` from settings.
    #[arg(long)]
    base_url: Option<String>,
    #[arg(long)]
    skip_health_check: bool,
}

#[snafu::report]
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), AppError> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut settings = AppSettings::load(cli.config.as_deref()).context(SettingsSnafu)?;
    if let Some(base_url) = cli.base_url {
        settings.server.base_url = base_url;
        settings = settings.normalized();
    }

    let transport = SseTransport::new(settings.server.clone()).context(TransportSnafu {
        stage: "build-transport",
    })?;

    if settings.check_health && !cli.skip_health_check {
        match transport.check_health().await {
            Ok(health) if health.ok => tracing::info!(
                base_url = %settings.server.base_url,
                model = health.model.as_deref().unwrap_or("unknown"),
                "server is healthy"
            ),
            Ok(_) => tracing::warn!(base_url = %settings.server.base_url, "server reported unhealthy"),
            Err(error) => tracing::warn!(
                base_url = %settings.server.base_url,
                error = %error,
                "health check failed, continuing"
            ),
        }
    }

    let mut controller = StreamController::new(transport);
    let mut view = TerminalView::new(std::io::stdout());
    let input = tokio::io::BufReader::new(tokio::io::stdin());

    turnstream::run(&mut controller, input, &mut view)
        .await
        .context(TerminalSnafu { stage: "run-session" })?;

    tracing::debug!(messages = controller.messages().len(), "session ended");
    Ok(())
}
