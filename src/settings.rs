use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::CLIENT_NAME;

const CONFIG_NAME: &str = "config.toml";
const ENV_PREFIX: &str = "BELVO_SYNC";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: Server,
    pub belvo: Belvo,
    pub database: Database,
    pub log: Log,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    pub host: String,
    pub port: u16,
    pub pipeline_timeout_secs: u64,
}

#[derive(Clone, Deserialize)]
pub struct Belvo {
    pub api_url: String,
    pub secret_id: String,
    pub secret_password: String,
    pub timeout_secs: u64,
}

impl std::fmt::Debug for Belvo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Belvo")
            .field("api_url", &self.api_url)
            .field("secret_id", &self.secret_id)
            .field("secret_password", &"********")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Database {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Log {
    pub level: String,
    pub json: bool,
}

impl Settings {
    /// Defaults, then the config file, then `BELVO_SYNC_*` variables.
    /// An explicit `config_path` must exist; the default one is optional.
    pub fn new(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut s = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.pipeline_timeout_secs", 120)?
            .set_default("belvo.api_url", belvo::SANDBOX_URL)?
            .set_default("belvo.secret_id", "")?
            .set_default("belvo.secret_password", "")?
            .set_default("belvo.timeout_secs", belvo::DEFAULT_TIMEOUT.as_secs() as i64)?
            .set_default("database.url", default_database_url())?
            .set_default("log.level", "info")?
            .set_default("log.json", true)?;

        s = match config_path {
            Some(path) => s.add_source(File::with_name(path)),
            None => s.add_source(File::with_name(&default_config_path()).required(false)),
        };

        let settings: Settings = s
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("belvo.secret_id", &self.belvo.secret_id),
            ("belvo.secret_password", &self.belvo.secret_password),
            ("database.url", &self.database.url),
        ];

        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Message(format!("{} is required", key)));
            }
        }

        Ok(())
    }
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(std::env::temp_dir)
        .join(CLIENT_NAME)
}

fn default_database_url() -> String {
    format!(
        "sqlite://{}?mode=rwc",
        data_dir().join(format!("{}.db", CLIENT_NAME)).display()
    )
}

fn default_config_path() -> String {
    dirs::config_dir()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(std::env::temp_dir)
        .join(CLIENT_NAME)
        .join(CONFIG_NAME)
        .display()
        .to_string()
}

/// Creates the parent directory of a file-backed SQLite url so that
/// `mode=rwc` can create the database itself.
pub fn ensure_database_dir(url: &str) -> std::io::Result<()> {
    let path = url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() || path.contains(":memory:") {
        return Ok(());
    }

    match Path::new(path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn config_file(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("belvo-sync-{}.toml", ulid::Ulid::new()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn reads_file_over_defaults() {
        let path = config_file(
            r#"
            [belvo]
            secret_id = "id"
            secret_password = "password"

            [database]
            url = "sqlite::memory:"

            [server]
            port = 9090
            "#,
        );

        let settings = Settings::new(path.to_str()).unwrap();

        assert_eq!(settings.server.port, 9090);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.pipeline_timeout_secs, 120);
        assert_eq!(settings.belvo.api_url, belvo::SANDBOX_URL);
        assert_eq!(settings.belvo.timeout_secs, 30);
        assert_eq!(settings.database.url, "sqlite::memory:");
        assert_eq!(settings.log.level, "info");
        assert!(settings.log.json);
        assert!(!format!("{:?}", settings.belvo).contains("password\""));
    }

    #[test]
    fn missing_credentials_rejected() {
        let path = config_file(
            r#"
            [belvo]
            secret_id = "id"
            "#,
        );

        let err = Settings::new(path.to_str()).unwrap_err();

        assert!(err.to_string().contains("belvo.secret_password is required"));
    }

    #[test]
    fn missing_explicit_file_rejected() {
        assert!(Settings::new(Some("/nonexistent/belvo-sync.toml")).is_err());
    }

    #[test]
    fn default_database_lives_in_data_dir() {
        let url = default_database_url();

        assert!(url.starts_with("sqlite://"));
        assert!(url.ends_with("belvo-sync.db?mode=rwc"));
    }

    #[test]
    fn database_dir_created_for_file_urls() {
        let dir = std::env::temp_dir().join(format!("belvo-sync-{}", ulid::Ulid::new()));
        let url = format!("sqlite://{}?mode=rwc", dir.join("sync.db").display());

        ensure_database_dir(&url).unwrap();
        ensure_database_dir("sqlite::memory:").unwrap();

        assert!(dir.is_dir());
    }
}
