//! Configuration loading and validation.
//!
//! All settings come from one TOML file given on the command line and are fixed
//! at process start — there is no live reconfiguration.

use std::path::Path;

use serde::Deserialize;

use crate::collector::DatabaseTarget;
use crate::error::{Error, Result};

/// Default polling interval between ticks, in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Default noise floor: samples averaging below this many milliseconds are ignored.
pub const DEFAULT_MIN_DURATION_MS: u64 = 50;

/// Main configuration struct.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub controller: ControllerConfig,

    /// Monitored databases, in report order.
    #[serde(default)]
    pub databases: Vec<DatabaseTarget>,

    #[serde(default)]
    pub run: RunConfig,

    pub smtp: SmtpConfig,

    pub email: EmailConfig,
}

/// Controller endpoint and credentials.
#[derive(Debug, Deserialize)]
pub struct ControllerConfig {
    /// Base URL of the controller, without trailing slash.
    pub base_url: String,

    /// Skip TLS certificate verification (self-signed on-prem controllers).
    #[serde(default)]
    pub insecure: bool,

    pub auth: AuthConfig,
}

/// Controller authentication mode.
///
/// SaaS deployments use a browser session (cookie + CSRF token); on-prem API
/// clients use HTTP Basic with the `username@account` convention.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum AuthConfig {
    Session {
        jsessionid: String,
        csrf_token: String,
    },
    Basic {
        username: String,
        account: String,
        password: String,
    },
}

/// Observation window settings.
#[derive(Debug, Deserialize)]
pub struct RunConfig {
    /// Total observation duration before the report is sent.
    pub duration_minutes: u64,

    /// Noise floor in milliseconds.
    #[serde(default = "default_min_duration_ms")]
    pub min_duration_ms: u64,

    /// Seconds between polling ticks.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            duration_minutes: 60,
            min_duration_ms: DEFAULT_MIN_DURATION_MS,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
        }
    }
}

fn default_min_duration_ms() -> u64 {
    DEFAULT_MIN_DURATION_MS
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

/// Mail submission settings.
#[derive(Debug, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
}

fn default_smtp_port() -> u16 {
    587
}

/// Report recipients and subject.
#[derive(Debug, Deserialize)]
pub struct EmailConfig {
    pub to: Vec<String>,
    #[serde(default = "default_subject")]
    pub subject: String,
}

fn default_subject() -> String {
    "Multi-DB Peak Performance Report".to_string()
}

impl Config {
    /// Loads and validates configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Config> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let mut config: Config =
            toml::from_str(&raw).map_err(|e| Error::Config(format!("bad TOML: {}", e)))?;
        config.controller.base_url = config
            .controller
            .base_url
            .trim_end_matches('/')
            .to_string();
        config.validate()?;
        Ok(config)
    }

    /// Checks invariants that TOML deserialization cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.controller.base_url.is_empty() {
            return Err(Error::Config("controller.base_url is required".into()));
        }
        if self.databases.is_empty() {
            return Err(Error::Config(
                "at least one [[databases]] entry is required".into(),
            ));
        }
        for (i, db) in self.databases.iter().enumerate() {
            if db.name.is_empty() {
                return Err(Error::Config(format!("databases[{}].name is empty", i)));
            }
            if self.databases[..i].iter().any(|d| d.name == db.name) {
                return Err(Error::Config(format!(
                    "duplicate database name '{}'",
                    db.name
                )));
            }
        }
        if self.email.to.is_empty() {
            return Err(Error::Config("email.to must list a recipient".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_toml() -> &'static str {
        r#"
            [controller]
            base_url = "https://controller.example.com/"

            [controller.auth]
            mode = "session"
            jsessionid = "abc"
            csrf_token = "def"

            [[databases]]
            name = "Production-Primary"
            server_id = 21

            [[databases]]
            name = "Analytics-DB"
            server_id = 31

            [run]
            duration_minutes = 60

            [smtp]
            host = "smtp.example.com"
            username = "alerts@example.com"
            password = "secret"

            [email]
            to = ["ops@example.com"]
        "#
    }

    #[test]
    fn parses_minimal_config_with_defaults() {
        let config: Config = toml::from_str(minimal_toml()).unwrap();
        assert_eq!(config.databases.len(), 2);
        assert_eq!(config.databases[0].server_id, 21);
        assert_eq!(config.run.min_duration_ms, DEFAULT_MIN_DURATION_MS);
        assert_eq!(config.run.poll_interval_secs, 60);
        assert_eq!(config.smtp.port, 587);
        assert_eq!(config.email.subject, "Multi-DB Peak Performance Report");
        config.validate().unwrap();
    }

    #[test]
    fn load_trims_trailing_slash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dbpeak.toml");
        std::fs::write(&path, minimal_toml()).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.controller.base_url, "https://controller.example.com");
    }

    #[test]
    fn basic_auth_mode_parses() {
        let toml = minimal_toml().replace(
            "mode = \"session\"\n            jsessionid = \"abc\"\n            csrf_token = \"def\"",
            "mode = \"basic\"\n            username = \"api\"\n            account = \"acme\"\n            password = \"pw\"",
        );
        let config: Config = toml::from_str(&toml).unwrap();
        match config.controller.auth {
            AuthConfig::Basic { ref account, .. } => assert_eq!(account, "acme"),
            _ => panic!("expected basic auth"),
        }
    }

    #[test]
    fn rejects_empty_databases() {
        let mut config: Config = toml::from_str(minimal_toml()).unwrap();
        config.databases.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_duplicate_database_names() {
        let mut config: Config = toml::from_str(minimal_toml()).unwrap();
        config.databases[1].name = config.databases[0].name.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_empty_recipients() {
        let mut config: Config = toml::from_str(minimal_toml()).unwrap();
        config.email.to.clear();
        assert!(config.validate().is_err());
    }
}
