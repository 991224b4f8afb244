use std::env;
use std::net::SocketAddr;
use teloxide::types::ChatId;
use thiserror::Error;

use crate::ticket::SupportRole;

const DEFAULT_KEEP_ALIVE_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Settings read from the environment at startup.
///
/// The bot token itself is picked up by `Bot::from_env` (`TELOXIDE_TOKEN`).
#[derive(Clone, Debug)]
pub struct Config {
    /// Forum supergroup whose members staff every ticket.
    pub support: SupportRole,
    pub keep_alive_addr: SocketAddr,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let group = lookup("SUPPORT_GROUP").ok_or(ConfigError::Missing("SUPPORT_GROUP"))?;
        let group: i64 = group.trim().parse().map_err(|_| ConfigError::Invalid {
            name: "SUPPORT_GROUP",
            value: group.clone(),
        })?;

        let addr = lookup("KEEP_ALIVE_ADDR").unwrap_or_else(|| DEFAULT_KEEP_ALIVE_ADDR.to_string());
        let keep_alive_addr = addr.parse().map_err(|_| ConfigError::Invalid {
            name: "KEEP_ALIVE_ADDR",
            value: addr.clone(),
        })?;

        Ok(Self {
            support: SupportRole(ChatId(group)),
            keep_alive_addr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn reads_support_group_and_defaults_keep_alive() {
        let config = Config::from_lookup(lookup(&[("SUPPORT_GROUP", "-1002337455276")])).unwrap();
        assert_eq!(config.support, SupportRole(ChatId(-1002337455276)));
        assert_eq!(config.keep_alive_addr, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn missing_support_group_is_reported() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("SUPPORT_GROUP")));
    }

    #[test]
    fn garbage_values_are_rejected() {
        let err = Config::from_lookup(lookup(&[("SUPPORT_GROUP", "support")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "SUPPORT_GROUP", .. }));

        let err = Config::from_lookup(lookup(&[
            ("SUPPORT_GROUP", "-100"),
            ("KEEP_ALIVE_ADDR", "localhost"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "KEEP_ALIVE_ADDR", .. }));
    }
}
