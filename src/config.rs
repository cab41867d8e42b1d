//! Deployment settings read from the environment.
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `CONDUIT_ENV` | `production` (or `prod`) marks a production deployment | development |
//! | `CONDUIT_ADDR` | `host:port` the server binds to | `0.0.0.0:3000` |
//!
//! The environment decides whether pipelines validate outbound payloads by
//! default: result checking is on everywhere except production.

use std::net::SocketAddr;

use crate::error::Error;

pub const ENV_VAR: &str = "CONDUIT_ENV";
pub const ADDR_VAR: &str = "CONDUIT_ADDR";

const DEFAULT_ADDR: &str = "0.0.0.0:3000";

/// The kind of deployment the process runs in.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    /// Reads `CONDUIT_ENV`. Unset or unrecognised values mean development.
    pub fn from_env() -> Self {
        std::env::var(ENV_VAR)
            .map(|v| Self::parse(&v))
            .unwrap_or_default()
    }

    /// Case-insensitive. Only `production` and `prod` select production.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}

/// Process-wide settings for a conduit server.
#[derive(Clone, Debug)]
pub struct Settings {
    pub addr: SocketAddr,
    pub environment: Environment,
}

impl Settings {
    /// Reads settings from the process environment.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through an arbitrary key lookup.
    ///
    /// ```rust
    /// use conduit::config::{Environment, Settings};
    ///
    /// let settings = Settings::from_lookup(|key| match key {
    ///     "CONDUIT_ENV" => Some("production".to_owned()),
    ///     _ => None,
    /// })
    /// .unwrap();
    ///
    /// assert_eq!(settings.environment, Environment::Production);
    /// assert_eq!(settings.addr.port(), 3000);
    /// ```
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let raw = lookup(ADDR_VAR).unwrap_or_else(|| DEFAULT_ADDR.to_owned());
        let addr = raw
            .parse()
            .map_err(|e| Error::Config(format!("{ADDR_VAR}=`{raw}` is not a socket address: {e}")))?;
        let environment = lookup(ENV_VAR)
            .map(|v| Environment::parse(&v))
            .unwrap_or_default();

        Ok(Self { addr, environment })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_aliases() {
        assert_eq!(Environment::parse("production"), Environment::Production);
        assert_eq!(Environment::parse(" PROD "), Environment::Production);
        assert_eq!(Environment::parse("staging"), Environment::Development);
        assert_eq!(Environment::parse(""), Environment::Development);
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let settings = Settings::from_lookup(|_| None).unwrap();
        assert_eq!(settings.addr, "0.0.0.0:3000".parse::<SocketAddr>().unwrap());
        assert!(!settings.environment.is_production());
    }

    #[test]
    fn rejects_bad_address() {
        let err = Settings::from_lookup(|key| {
            (key == ADDR_VAR).then(|| "not-an-address".to_owned())
        })
        .unwrap_err();

        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("CONDUIT_ADDR"));
    }
}
