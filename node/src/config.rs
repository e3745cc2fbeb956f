// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use crate::errors::ConfigError;
use registry_core::StoreConfig;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

pub const ENV_BIND_ADDR: &str = "REGISTRY_BIND_ADDR";
pub const ENV_DATA_DIR: &str = "REGISTRY_DATA_DIR";
pub const ENV_STATIC_DIR: &str = "REGISTRY_STATIC_DIR";
pub const ENV_BODY_LIMIT: &str = "REGISTRY_BODY_LIMIT";

/// Photos arrive inline as data URLs, so bodies can get large.
pub const DEFAULT_BODY_LIMIT: usize = 50 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    /// Directory served for any path the API does not handle. `None` disables it.
    pub static_dir: Option<PathBuf>,
    pub body_limit_bytes: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 3000)),
            data_dir: PathBuf::from(registry_core::config::DEFAULT_DATA_DIR),
            static_dir: Some(PathBuf::from("public")),
            body_limit_bytes: DEFAULT_BODY_LIMIT,
        }
    }
}

impl NodeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns. An empty
    /// `REGISTRY_STATIC_DIR` turns static file serving off.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(v) = lookup(ENV_BIND_ADDR) {
            cfg.bind_addr = v.parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_BIND_ADDR,
                value: v.clone(),
            })?;
        }
        if let Some(v) = lookup(ENV_DATA_DIR) {
            if v.is_empty() {
                return Err(ConfigError::InvalidValue { key: ENV_DATA_DIR, value: v });
            }
            cfg.data_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_STATIC_DIR) {
            cfg.static_dir = if v.is_empty() { None } else { Some(PathBuf::from(v)) };
        }
        if let Some(v) = lookup(ENV_BODY_LIMIT) {
            cfg.body_limit_bytes = v.parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_BODY_LIMIT,
                value: v.clone(),
            })?;
        }

        Ok(cfg)
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::in_dir(&self.data_dir)
    }
}
