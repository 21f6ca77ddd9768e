use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;

const CONFIG_FILE_ENV: &str = "LIBRARY_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "library.toml";
const ENV_PREFIX: &str = "LIBRARY";

/// Top-level configuration loaded from layered sources.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

impl Settings {
    /// Load configuration by layering `.env`, the config file and `LIBRARY_*` variables.
    ///
    /// `LIBRARY_DATABASE__PATH=/tmp/x.db` overrides `database.path`.
    pub fn load() -> anyhow::Result<Self> {
        // A missing `.env` is fine.
        let _ = dotenvy::dotenv();

        let config_file = std::env::var(CONFIG_FILE_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));

        Self::from_sources(
            config::File::from(config_file.clone()).required(false),
            environment(),
        )
        .with_context(|| {
            format!(
                "failed to build configuration from {}",
                config_file.display()
            )
        })
    }

    /// Layer `file` under `env` and deserialize the result.
    fn from_sources<F>(file: F, env: config::Environment) -> anyhow::Result<Self>
    where
        F: config::Source + Send + Sync + 'static,
    {
        let cfg = config::Config::builder()
            .add_source(file)
            .add_source(env)
            .build()?;

        cfg.try_deserialize()
            .with_context(|| "failed to deserialize configuration")
    }
}

/// `LIBRARY_SECTION__KEY` maps to `section.key`.
fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "DatabaseSettings::default_path")]
    pub path: PathBuf,
    /// Delete the database file before opening it.
    #[serde(default)]
    pub reset_on_start: bool,
}

impl DatabaseSettings {
    fn default_path() -> PathBuf {
        PathBuf::from("library.db")
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: Self::default_path(),
            reset_on_start: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default)]
    pub log_format: LogFormat,
    /// Used when `RUST_LOG` is not set.
    #[serde(default = "TelemetrySettings::default_filter")]
    pub filter: String,
}

impl TelemetrySettings {
    fn default_filter() -> String {
        "info".to_string()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            filter: Self::default_filter(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_database_is_library_db() {
        let settings = Settings::default();
        assert_eq!(settings.database.path, PathBuf::from("library.db"));
        assert!(!settings.database.reset_on_start);
    }

    #[test]
    fn default_log_format_is_pretty() {
        let settings = Settings::default();
        assert_eq!(settings.telemetry.log_format, LogFormat::Pretty);
        assert_eq!(settings.telemetry.filter, "info");
    }

    #[test]
    fn reads_toml_sections() {
        let cfg = config::Config::builder()
            .add_source(config::File::from_str(
                "[database]\npath = \"/tmp/ledger.db\"\nreset_on_start = true\n\n[telemetry]\nlog_format = \"json\"\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();
        let settings: Settings = cfg.try_deserialize().unwrap();
        assert_eq!(settings.database.path, PathBuf::from("/tmp/ledger.db"));
        assert!(settings.database.reset_on_start);
        assert_eq!(settings.telemetry.log_format, LogFormat::Json);
        assert_eq!(settings.telemetry.filter, "info");
    }

    #[test]
    fn environment_overrides_file() {
        let file = config::File::from_str(
            "[database]\npath = \"/tmp/from-file.db\"\n\n[telemetry]\nlog_format = \"json\"\n",
            config::FileFormat::Toml,
        );
        let mut vars = config::Map::new();
        vars.insert(
            "LIBRARY_DATABASE__PATH".to_string(),
            "/tmp/from-env.db".to_string(),
        );
        vars.insert(
            "LIBRARY_DATABASE__RESET_ON_START".to_string(),
            "true".to_string(),
        );
        vars.insert("OTHER_DATABASE__PATH".to_string(), "/tmp/ignored.db".to_string());

        let settings = Settings::from_sources(file, environment().source(Some(vars))).unwrap();
        assert_eq!(settings.database.path, PathBuf::from("/tmp/from-env.db"));
        assert!(settings.database.reset_on_start);
        assert_eq!(settings.telemetry.log_format, LogFormat::Json);
    }

    #[test]
    fn missing_file_and_empty_environment_give_defaults() {
        let file = config::File::from(PathBuf::from("/nonexistent/library.toml")).required(false);
        let env = environment().source(Some(config::Map::new()));
        let settings = Settings::from_sources(file, env).unwrap();
        assert_eq!(settings.database.path, PathBuf::from("library.db"));
        assert_eq!(settings.telemetry.filter, "info");
    }
}
