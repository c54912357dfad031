// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub bind_addr: SocketAddr,
    /// Record log location. `None` keeps everything in memory.
    pub log_path: Option<PathBuf>,
    pub stops_path: PathBuf,
    pub routes_path: PathBuf,
    /// Idle interval after which a stream viewer gets a heartbeat.
    pub keepalive: Duration,
    /// Per-subscriber queue bound.
    pub queue_capacity: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            log_path: Some(PathBuf::from("locations.log")),
            stops_path: PathBuf::from("stops.csv"),
            routes_path: PathBuf::from("routes.json"),
            keepalive: Duration::from_secs(15),
            queue_capacity: 64,
        }
    }
}

impl NodeConfig {
    /// Defaults overridden by `BUSLINE_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Unparsable values keep the default and log a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        if let Some(addr) = lookup("BUSLINE_BIND_ADDR") {
            match addr.parse() {
                Ok(addr) => cfg.bind_addr = addr,
                Err(_) => tracing::warn!("BUSLINE_BIND_ADDR={:?} is not a socket address, using {}", addr, cfg.bind_addr),
            }
        }
        if let Some(path) = lookup("BUSLINE_LOG_PATH") {
            cfg.log_path = if path.trim().is_empty() {
                None
            } else {
                Some(PathBuf::from(path))
            };
        }
        if let Some(path) = lookup("BUSLINE_STOPS_PATH") {
            cfg.stops_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("BUSLINE_ROUTES_PATH") {
            cfg.routes_path = PathBuf::from(path);
        }
        if let Some(secs) = positive(&lookup, "BUSLINE_KEEPALIVE_SECS") {
            cfg.keepalive = Duration::from_secs(secs as u64);
        }
        if let Some(cap) = positive(&lookup, "BUSLINE_QUEUE_CAPACITY") {
            cfg.queue_capacity = cap;
        }

        cfg
    }
}

fn positive(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<usize> {
    let raw = lookup(key)?;
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => Some(n),
        _ => {
            tracing::warn!("{}={:?} is not a positive integer, keeping default", key, raw);
            None
        }
    }
}
