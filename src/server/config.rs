use std::path::PathBuf;

pub const DEFAULT_ADDRESS: &str = "localhost:9999";
pub const DEFAULT_STORAGE: &str = "/tmp/sourced-es.redb";

/// Where the event server listens and keeps its log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub address: String,
    pub storage_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            address: DEFAULT_ADDRESS.to_string(),
            storage_path: PathBuf::from(DEFAULT_STORAGE),
        }
    }
}

impl ServerConfig {
    /// Reads `SOURCED_ADDR` and `SOURCED_DB`, falling back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        ServerConfig {
            address: lookup("SOURCED_ADDR")
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.address),
            storage_path: lookup("SOURCED_DB")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_path),
        }
    }
}
