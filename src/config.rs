use std::{net::SocketAddr, path::PathBuf, str::FromStr};

use anyhow::{Context, Result, anyhow};

#[derive(Debug, Clone)]
pub struct Config {
    /// Unset means the offline local store.
    pub database_url: Option<String>,
    pub bind: SocketAddr,
    pub data_dir: PathBuf,
    pub max_connections: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // a missing .env file is fine
        let _ = dotenv::dotenv();

        let database_url = dotenv::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty());

        let bind = dotenv::var("SMALLTALK_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_owned());
        let bind = SocketAddr::from_str(&bind).map_err(|err| anyhow!("invalid SMALLTALK_BIND {bind:?}: {err}"))?;

        let data_dir = dotenv::var("SMALLTALK_DATA_DIR").unwrap_or_else(|_| ".smalltalk".to_owned());

        let max_connections = match dotenv::var("SMALLTALK_MAX_CONNECTIONS") {
            Ok(value) => value
                .parse()
                .with_context(|| format!("invalid SMALLTALK_MAX_CONNECTIONS {value:?}"))?,
            Err(_) => 16,
        };

        Ok(Self {
            database_url,
            bind,
            data_dir: PathBuf::from(data_dir),
            max_connections,
        })
    }
}
