use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};
use turnstream_sse::SseConfig;

pub const SETTINGS_DIRECTORY_NAME: &str = "turnstream";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
/// Prefix of environment overrides; nested keys are separated by `__`,
/// e.g. `TURNSTREAM_SERVER__BASE_URL`.
pub const ENV_PREFIX: &str = "TURNSTREAM_";
pub const CONFIG_PATH_ENV: &str = "TURNSTREAM_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default)]
    pub server: SseConfig,
    /// Probe the server's health endpoint before reading input.
    #[serde(default = "default_check_health")]
    pub check_health: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            server: SseConfig::default(),
            check_health: default_check_health(),
        }
    }
}

impl AppSettings {
    pub fn normalized(mut self) -> Self {
        self.server = self.server.normalized();
        self
    }

    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".turnstream"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(SETTINGS_FILE_NAME)
    }

    /// Layers defaults, the JSON file at `path` (if present) and environment
    /// overrides, in that order.
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(AppSettings::default()))
            .merge(Json::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn load_from(path: &Path) -> SettingsResult<Self> {
        if !path.exists() {
            tracing::info!("settings file not found at {:?}, using defaults", path);
        }

        let settings = Self::figment(path)
            .extract::<AppSettings>()
            .context(ExtractSnafu {
                stage: "extract-settings",
                path: path.to_path_buf(),
            })?;

        Ok(settings.normalized())
    }

    /// Loads from `path`, or from the per-user config directory when absent.
    pub fn load(path: Option<&Path>) -> SettingsResult<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => Self::load_from(&Self::default_config_path()),
        }
    }
}

pub type SettingsResult<T> = Result<T, SettingsError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("failed to load settings from {path:?} on `{stage}`: {source}"))]
    Extract {
        stage: &'static str,
        path: PathBuf,
        source: figment::Error,
    },
}

fn default_check_health() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use figment::Jail;
    use turnstream_sse::{DEFAULT_BASE_URL, DEFAULT_STREAM_PATH};

    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        Jail::expect_with(|jail| {
            let path = jail.directory().join("absent.json");
            let settings = AppSettings::load_from(&path).expect("defaults load");

            assert_eq!(settings, AppSettings::default());
            assert_eq!(settings.server.base_url, DEFAULT_BASE_URL);
            Ok(())
        });
    }

    #[test]
    fn json_file_overrides_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                SETTINGS_FILE_NAME,
                r#"{
                    "server": { "base_url": "http://chat.internal:9000/", "stream_path": "sse" },
                    "check_health": false
                }"#,
            )?;

            let settings = AppSettings::load_from(&jail.directory().join(SETTINGS_FILE_NAME))
                .expect("file loads");

            assert_eq!(settings.server.base_url, "http://chat.internal:9000");
            assert_eq!(settings.server.stream_path, "/sse");
            assert!(!settings.check_health);
            Ok(())
        });
    }

    #[test]
    fn environment_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                SETTINGS_FILE_NAME,
                r#"{ "server": { "base_url": "http://from-file:8000" } }"#,
            )?;
            jail.set_env("TURNSTREAM_SERVER__BASE_URL", "http://from-env:7000");

            let settings = AppSettings::load_from(&jail.directory().join(SETTINGS_FILE_NAME))
                .expect("file loads");

            assert_eq!(settings.server.base_url, "http://from-env:7000");
            assert_eq!(settings.server.stream_path, DEFAULT_STREAM_PATH);
            Ok(())
        });
    }

    #[test]
    fn malformed_file_is_an_error() {
        Jail::expect_with(|jail| {
            jail.create_file(SETTINGS_FILE_NAME, "{ not json")?;

            let result = AppSettings::load_from(&jail.directory().join(SETTINGS_FILE_NAME));
            assert!(matches!(result, Err(SettingsError::Extract { .. })));
            Ok(())
        });
    }
}
