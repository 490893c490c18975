//! Process configuration, read once from the environment at startup.
//!
//! | Variable                  | Meaning                                  | Default   |
//! |---------------------------|------------------------------------------|-----------|
//! | `HOST`                    | bind address                             | `0.0.0.0` |
//! | `PORT`                    | listening port                           | `5000`    |
//! | `EVENTS_ALLOW_ORIGIN`     | `Access-Control-Allow-Origin` value      | not sent  |
//! | `EVENTS_CLOSE_AFTER_SECS` | server-initiated close after N seconds   | never     |
//!
//! Empty values count as unset.

use std::env;
use std::num::ParseIntError;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;

/// Errors produced while loading [`Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {source}")]
    Invalid {
        key: &'static str,
        value: String,
        #[source]
        source: ParseIntError,
    },
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Cross-origin access for the stream. Off unless set; any value here
    /// is sent verbatim, so production deployments should name an origin
    /// rather than `*`.
    pub allow_origin: Option<String>,
    pub close_after: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            allow_origin: None,
            close_after: None,
        }
    }
}

impl Config {
    /// Loads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a numeric variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which maps a variable name to
    /// its value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a numeric variable does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match get("PORT") {
            Some(value) => parse(value, "PORT")?,
            None => DEFAULT_PORT,
        };

        let close_after = get("EVENTS_CLOSE_AFTER_SECS")
            .map(|value| parse::<u64>(value, "EVENTS_CLOSE_AFTER_SECS"))
            .transpose()?
            .map(Duration::from_secs);

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| DEFAULT_HOST.to_owned()),
            port,
            allow_origin: get("EVENTS_ALLOW_ORIGIN"),
            close_after,
        })
    }

    /// The `host:port` string to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse<T>(value: String, key: &'static str) -> Result<T, ConfigError>
where
    T: FromStr<Err = ParseIntError>,
{
    match value.trim().parse() {
        Ok(parsed) => Ok(parsed),
        Err(source) => Err(ConfigError::Invalid { key, value, source }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.port, 5000);
        assert_eq!(config.bind_addr(), "0.0.0.0:5000");
        assert_eq!(config.allow_origin, None);
        assert_eq!(config.close_after, None);
    }

    #[test]
    fn empty_values_count_as_unset() {
        let config = load(&[("PORT", ""), ("EVENTS_ALLOW_ORIGIN", " ")]).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.allow_origin, None);
    }

    #[test]
    fn reads_every_variable() {
        let config = load(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "8081"),
            ("EVENTS_ALLOW_ORIGIN", "https://board.example.com"),
            ("EVENTS_CLOSE_AFTER_SECS", "20"),
        ])
        .unwrap();
        assert_eq!(config.bind_addr(), "127.0.0.1:8081");
        assert_eq!(
            config.allow_origin.as_deref(),
            Some("https://board.example.com")
        );
        assert_eq!(config.close_after, Some(Duration::from_secs(20)));
    }

    #[test]
    fn bad_port_is_an_error() {
        let err = load(&[("PORT", "http")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));
        assert!(load(&[("PORT", "70000")]).is_err());
        assert!(load(&[("EVENTS_CLOSE_AFTER_SECS", "-1")]).is_err());
    }
}
