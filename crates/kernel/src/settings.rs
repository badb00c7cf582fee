use std::path::PathBuf;

use anyhow::{anyhow, Context};
use serde::Deserialize;

const DEFAULT_ENV: &str = "local";
const ENV_VAR_NAME: &str = "BOOKCAT_ENV";
const CONFIG_DIR_ENV: &str = "BOOKCAT_CONFIG_DIR";

/// Deployment environment the application is running in.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

/// Top-level configuration structure loaded from layered sources.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub reports: ReportSettings,
}

impl Settings {
    /// Load configuration by layering `.env`, base file, and environment overlay.
    pub fn load() -> anyhow::Result<Self> {
        // Allow missing `.env` files without failing.
        let _ = dotenvy::dotenv();

        let environment = std::env::var(ENV_VAR_NAME).unwrap_or_else(|_| DEFAULT_ENV.to_string());
        let config_dir = match std::env::var(CONFIG_DIR_ENV) {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => std::env::current_dir()
                .context("unable to resolve current directory")?
                .join("config"),
        };

        let base_path = config_dir.join("base.toml");
        let environment_path = config_dir.join(format!("{environment}.toml"));

        let builder = config::Config::builder()
            .add_source(config::File::from(base_path).required(false))
            .add_source(config::File::from(environment_path).required(false))
            .add_source(config::Environment::with_prefix("BOOKCAT").separator("__"));

        let cfg = builder
            .build()
            .with_context(|| "failed to build configuration")?;

        let mut settings: Settings = cfg
            .try_deserialize()
            .with_context(|| "failed to deserialize configuration")?;

        settings.environment = match environment.as_str() {
            "local" => Environment::Local,
            "staging" => Environment::Staging,
            "production" => Environment::Production,
            other => {
                return Err(anyhow!(
                    "unsupported environment '{}'; expected local/staging/production",
                    other
                ));
            }
        };

        if settings.environment == Environment::Production
            && settings.auth.token_secret == AuthSettings::default_token_secret()
        {
            return Err(anyhow!("auth.token_secret must be set in production"));
        }

        Ok(settings)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "ServerSettings::default_host")]
    pub host: String,
    #[serde(default = "ServerSettings::default_port")]
    pub port: u16,
    #[serde(default = "ServerSettings::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl ServerSettings {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        8080
    }

    fn default_request_timeout_ms() -> u64 {
        15000
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            request_timeout_ms: Self::default_request_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "DatabaseSettings::default_url")]
    pub url: String,
    #[serde(default = "DatabaseSettings::default_max_connections")]
    pub max_connections: u32,
}

impl DatabaseSettings {
    fn default_url() -> String {
        "sqlite://bookcat.db".to_string()
    }

    fn default_max_connections() -> u32 {
        5
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: Self::default_url(),
            max_connections: Self::default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default = "TelemetrySettings::default_log_level")]
    pub log_level: String,
}

impl TelemetrySettings {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            log_level: Self::default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Access gate configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    /// Header every client request must carry.
    #[serde(default = "AuthSettings::default_origin_header")]
    pub origin_header: String,
    /// Required value of `origin_header`.
    #[serde(default = "AuthSettings::default_origin_value")]
    pub origin_value: String,
    #[serde(default = "AuthSettings::default_token_secret")]
    pub token_secret: String,
    #[serde(default = "AuthSettings::default_token_ttl_minutes")]
    pub token_ttl_minutes: i64,
    /// Shared secret for administrative endpoints; they are closed when unset.
    #[serde(default)]
    pub admin_token: Option<String>,
}

impl AuthSettings {
    fn default_origin_header() -> String {
        "X-Requested-From".to_string()
    }

    fn default_origin_value() -> String {
        "BookCatApp".to_string()
    }

    fn default_token_secret() -> String {
        "local-development-secret".to_string()
    }

    fn default_token_ttl_minutes() -> i64 {
        30
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            origin_header: Self::default_origin_header(),
            origin_value: Self::default_origin_value(),
            token_secret: Self::default_token_secret(),
            token_ttl_minutes: Self::default_token_ttl_minutes(),
            admin_token: None,
        }
    }
}

/// Where rendered reports and uploaded images are written.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    #[serde(default = "StorageSettings::default_root")]
    pub root: PathBuf,
    /// Prefix for absolute image URLs, e.g. `https://books.example.org`.
    #[serde(default)]
    pub public_base_url: String,
    #[serde(default = "StorageSettings::default_max_image_bytes")]
    pub max_image_bytes: usize,
}

impl StorageSettings {
    fn default_root() -> PathBuf {
        PathBuf::from("wwwroot")
    }

    fn default_max_image_bytes() -> usize {
        5 * 1024 * 1024
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            root: Self::default_root(),
            public_base_url: String::new(),
            max_image_bytes: Self::default_max_image_bytes(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportSettings {
    #[serde(default = "ReportSettings::default_templates_dir")]
    pub templates_dir: PathBuf,
    #[serde(default = "ReportSettings::default_inventory_book_template")]
    pub inventory_book_template: String,
    #[serde(default = "ReportSettings::default_write_off_act_template")]
    pub write_off_act_template: String,
    /// Text that identifies the total-sum paragraph of a write-off act.
    #[serde(default = "ReportSettings::default_summary_marker")]
    pub summary_marker: String,
}

impl ReportSettings {
    fn default_templates_dir() -> PathBuf {
        PathBuf::from("templates")
    }

    fn default_inventory_book_template() -> String {
        "inventory_book.docx".to_string()
    }

    fn default_write_off_act_template() -> String {
        "write_off_act.docx".to_string()
    }

    fn default_summary_marker() -> String {
        "Всього на суму".to_string()
    }
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            templates_dir: Self::default_templates_dir(),
            inventory_book_template: Self::default_inventory_book_template(),
            write_off_act_template: Self::default_write_off_act_template(),
            summary_marker: Self::default_summary_marker(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_environment_is_local() {
        let settings = Settings::default();
        assert_eq!(settings.environment, Environment::Local);
    }

    #[test]
    fn default_database_is_file_backed_sqlite() {
        let settings = Settings::default();
        assert_eq!(settings.database.url, "sqlite://bookcat.db");
    }

    #[test]
    fn default_gate_expects_app_origin() {
        let auth = AuthSettings::default();
        assert_eq!(auth.origin_header, "X-Requested-From");
        assert_eq!(auth.origin_value, "BookCatApp");
        assert_eq!(auth.token_ttl_minutes, 30);
        assert!(auth.admin_token.is_none());
    }

    #[test]
    fn partial_sections_fall_back_to_defaults() {
        let cfg = config::Config::builder()
            .add_source(config::File::from_str(
                "[reports]\ntemplates_dir = \"/srv/templates\"\n[storage]\nmax_image_bytes = 1024\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();
        let settings: Settings = cfg.try_deserialize().unwrap();

        assert_eq!(settings.reports.templates_dir, PathBuf::from("/srv/templates"));
        assert_eq!(settings.reports.write_off_act_template, "write_off_act.docx");
        assert_eq!(settings.storage.max_image_bytes, 1024);
        assert_eq!(settings.storage.root, PathBuf::from("wwwroot"));
        assert_eq!(settings.server.port, 8080);
    }
}
