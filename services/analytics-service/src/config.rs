use std::env;

use crate::error::ConfigError;

const DEFAULT_PORT: u16 = 3030;
const DEFAULT_TABLE: &str = "telemetry";

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub port: u16,
    pub database_url: String,
    pub table: String,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("TELEMETRY_DATABASE_URL")
            .filter(|value| !value.trim().is_empty())
            .ok_or(ConfigError::Missing("TELEMETRY_DATABASE_URL"))?;

        let port = match lookup("PORT") {
            Some(value) => value.parse::<u16>().map_err(|err| ConfigError::Invalid {
                key: "PORT",
                reason: err.to_string(),
            })?,
            None => DEFAULT_PORT,
        };

        let table = lookup("TELEMETRY_TABLE").unwrap_or_else(|| DEFAULT_TABLE.to_string());
        if !is_plain_identifier(&table) {
            return Err(ConfigError::Invalid {
                key: "TELEMETRY_TABLE",
                reason: format!("{table:?} is not a plain identifier"),
            });
        }

        Ok(Self {
            port,
            database_url,
            table,
        })
    }
}

fn is_plain_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    value.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
