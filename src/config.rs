use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use crate::catalog::Catalog;
use crate::error::Result;

pub const DB_ENV: &str = "ZOOQUEST_DB";
pub const CATALOG_ENV: &str = "ZOOQUEST_CATALOG";
pub const DEFAULT_LOG_FILTER: &str = "warn";

const DEFAULT_DB_NAME: &str = "zooquest.db";

pub fn db_path() -> PathBuf {
    if let Ok(path) = std::env::var(DB_ENV) {
        return PathBuf::from(path);
    }

    let config_dir = dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("zooquest");

    std::fs::create_dir_all(&config_dir).ok();
    config_dir.join(DEFAULT_DB_NAME)
}

/// An explicit `--catalog` wins over the environment.
pub fn catalog_path(flag: Option<PathBuf>) -> Option<PathBuf> {
    flag.or_else(|| {
        std::env::var(CATALOG_ENV)
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
    })
}

pub fn load_catalog(path: Option<&Path>) -> Result<Catalog> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            Catalog::from_json(&raw)
        }
        None => Ok(Catalog::builtin()),
    }
}

// Bad or oversized filters must not stop the CLI from starting.
pub fn log_filter(raw: Option<&str>) -> EnvFilter {
    raw.map(str::trim)
        .filter(|raw| !raw.is_empty() && raw.len() <= 4096)
        .and_then(|raw| EnvFilter::try_new(raw).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}
