//! Service configuration

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Deserializer};
use tracing_subscriber::filter::Directive;

/// Logging output format
#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq)]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Logging {
    /// Additional filtering directives
    #[serde(default, deserialize_with = "Logging::deserialize_filters")]
    pub filters: Vec<Directive>,

    /// Logging format
    #[serde(default)]
    pub format: LogFormat,
}

impl Logging {
    fn deserialize_filters<'de, D>(deserializer: D) -> Result<Vec<Directive>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let dirs: Vec<String> = Deserialize::deserialize(deserializer)?;
        dirs.into_iter()
            .map(|dir| dir.parse().map_err(serde::de::Error::custom))
            .collect()
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Database {
    /// In-memory database, lost on restart
    Memory {
        #[serde(default = "Database::default_max_connections")]
        max_connections: u32,
    },
    /// SQLite database file
    SqLite {
        path: PathBuf,
        #[serde(default = "Database::default_max_connections")]
        max_connections: u32,
        /// Run migrations on startup
        #[serde(default)]
        migrate: bool,
    },
}

impl Database {
    fn default_max_connections() -> u32 {
        4
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::Memory {
            max_connections: Self::default_max_connections(),
        }
    }
}

/// Session cookie configuration
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct Session {
    /// Domain the session cookie is bound to
    #[serde(default)]
    pub cookie_domain: Option<String>,

    /// Sends the cookie over HTTPS only
    #[serde(default)]
    pub secure_cookie: bool,
}

/// Top level service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Address where to host the service
    #[serde(default = "Config::default_host")]
    pub host: SocketAddr,

    /// Enables GraphiQL endpoint
    #[serde(default)]
    pub graphiql: bool,

    /// Populates empty database with demo users and activities
    #[serde(default)]
    pub seed: bool,

    /// Logging configuration
    #[serde(default)]
    pub logging: Logging,

    /// Session configuration
    #[serde(default)]
    pub session: Session,

    /// Database configuration
    #[serde(default)]
    pub db: Database,
}

impl Config {
    fn default_host() -> SocketAddr {
        ([127, 0, 0, 1], 3030).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();

        assert_eq!(config.host, Config::default_host());
        assert!(!config.graphiql);
        assert!(!config.seed);
        assert_eq!(config.logging.format, LogFormat::Compact);
        assert!(config.logging.filters.is_empty());
        assert_eq!(config.session, Session::default());
        assert_eq!(config.db, Database::default());
    }

    #[test]
    fn full_config() {
        let config: Config = toml::from_str(
            r#"
            host = "0.0.0.0:3000"
            graphiql = true
            seed = true

            [logging]
            format = "Pretty"
            filters = ["api_server=debug", "sqlx=warn"]

            [session]
            cookie_domain = "localhost"
            secure_cookie = true

            [db]
            type = "SqLite"
            path = "activities.db"
            migrate = true
            "#,
        )
        .unwrap();

        assert_eq!(config.host, ([0, 0, 0, 0], 3000).into());
        assert!(config.graphiql);
        assert!(config.seed);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.logging.filters.len(), 2);
        assert_eq!(config.session.cookie_domain.as_deref(), Some("localhost"));
        assert!(config.session.secure_cookie);
        assert_eq!(
            config.db,
            Database::SqLite {
                path: "activities.db".into(),
                max_connections: 4,
                migrate: true,
            }
        );
    }

    #[test]
    fn invalid_log_filter_is_rejected() {
        let config = toml::from_str::<Config>(
            r#"
            [logging]
            filters = ["api_server=loud"]
            "#,
        );
        assert!(config.is_err());
    }
}
