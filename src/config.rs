use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::error::{config_error, env_var_error, Error};

const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:3000";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    Memory,
}

impl FromStr for StoreKind {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "postgres" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(config_error(format!("unknown STORE {:?}", other))),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub store: StoreKind,
    /// Only present for the postgres store.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub bind_address: SocketAddr,
    pub password_hash_cost: u32,
}

impl Config {
    /// Reads the process environment after loading `.env`, if there is one.
    pub fn from_env() -> Result<Self, Error> {
        dotenv::dotenv().ok();

        Self::from_lookup(|key| match env::var(key) {
            Ok(value) => Ok(Some(value)),
            Err(env::VarError::NotPresent) => Ok(None),
            Err(err) => Err(env_var_error(err)),
        })
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Result<Option<String>, Error>,
    {
        let store = parse_or(&lookup, "STORE", StoreKind::Postgres)?;

        let database_url = lookup("DATABASE_URL")?;
        if store == StoreKind::Postgres && database_url.is_none() {
            return Err(config_error("DATABASE_URL is required for the postgres store"));
        }

        let bind_address = lookup("BIND_ADDRESS")?
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());
        let bind_address = bind_address
            .parse()
            .map_err(|_| config_error(format!("BIND_ADDRESS {:?} is not a socket address", bind_address)))?;

        Ok(Self {
            store,
            database_url,
            database_max_connections: parse_or(
                &lookup,
                "DATABASE_MAX_CONNECTIONS",
                DEFAULT_MAX_CONNECTIONS,
            )?,
            bind_address,
            password_hash_cost: parse_or(&lookup, "PASSWORD_HASH_COST", bcrypt::DEFAULT_COST)?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, Error>
where
    F: Fn(&str) -> Result<Option<String>, Error>,
    T: FromStr,
{
    match lookup(key)? {
        Some(value) => value
            .parse()
            .map_err(|_| config_error(format!("{} has an invalid value {:?}", key, value))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, Error> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();

        Config::from_lookup(|key| Ok(vars.get(key).cloned()))
    }

    #[test]
    fn defaults_apply() {
        let config = config(&[("DATABASE_URL", "postgresql://localhost/carrus")]).unwrap();

        assert_eq!(config.store, StoreKind::Postgres);
        assert_eq!(config.database_max_connections, 5);
        assert_eq!(config.bind_address, "127.0.0.1:3000".parse().unwrap());
        assert_eq!(config.password_hash_cost, bcrypt::DEFAULT_COST);
    }

    #[test]
    fn postgres_requires_a_database_url() {
        assert!(config(&[]).is_err());
        assert!(config(&[("STORE", "memory")]).unwrap().database_url.is_none());
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert!(config(&[("STORE", "redis")]).is_err());
        assert!(config(&[("STORE", "memory"), ("BIND_ADDRESS", "nowhere")]).is_err());
        assert!(config(&[("STORE", "memory"), ("DATABASE_MAX_CONNECTIONS", "many")]).is_err());
    }

    #[test]
    fn overrides_are_read() {
        let config = config(&[
            ("STORE", "Memory"),
            ("BIND_ADDRESS", "0.0.0.0:8080"),
            ("PASSWORD_HASH_COST", "6"),
        ])
        .unwrap();

        assert_eq!(config.store, StoreKind::Memory);
        assert_eq!(config.bind_address.port(), 8080);
        assert_eq!(config.password_hash_cost, 6);
    }
}
