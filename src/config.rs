use std::net::SocketAddr;

use anyhow::Context;

pub const BIND_VAR: &str = "RELAY_BIND";
pub const PRUNE_VAR: &str = "RELAY_PRUNE_EMPTY_ROOMS";
pub const LOG_VAR: &str = "RELAY_LOG";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// Drop a room as soon as its last member leaves.
    pub prune_empty_rooms: bool,
    /// Log filter used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            prune_empty_rooms: false,
            log_filter: "info".to_owned(),
        }
    }
}

impl Config {
    /// Reads the environment, after loading `.env` if there is one.
    pub fn from_env() -> anyhow::Result<Config> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Config> {
        let mut config = Config::default();

        if let Some(bind) = lookup(BIND_VAR) {
            config.bind_addr = bind
                .parse()
                .with_context(|| format!("{BIND_VAR}={bind} is not a socket address"))?;
        }

        if let Some(prune) = lookup(PRUNE_VAR) {
            config.prune_empty_rooms = prune
                .trim()
                .parse()
                .with_context(|| format!("{PRUNE_VAR}={prune} is not true or false"))?;
        }

        if let Some(filter) = lookup(LOG_VAR) {
            config.log_filter = filter;
        }

        Ok(config)
    }
}
