//! Runtime settings for the binaries.
//!
//! Each key resolves as: CLI override, then process environment, then the
//! `.env` file, then the built-in default.

use anyhow::{Context, Result, anyhow};
use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
};

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DEFAULT_VIDTUBE_PORT: u16 = 8000;
pub const DEFAULT_VIDTUBE_HOST: &str = "127.0.0.1";

#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub database_path: PathBuf,
    pub asset_root: PathBuf,
    /// Prefix of the URLs handed out for stored assets.
    pub public_base_url: String,
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Default)]
pub struct RuntimeOverrides {
    pub database_path: Option<PathBuf>,
    pub asset_root: Option<PathBuf>,
    pub public_base_url: Option<String>,
    pub port: Option<u16>,
    pub host: Option<String>,
    pub env_path: Option<PathBuf>,
}

pub fn resolve_runtime_settings(overrides: RuntimeOverrides) -> Result<RuntimeSettings> {
    let env_path = overrides
        .env_path
        .as_deref()
        .unwrap_or_else(|| Path::new(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(env_path)?;
    build_settings_with_overrides(&file_vars, env_var_string, overrides)
}

/// Resolves only the database location, for tools that never touch assets
/// or the network.
pub fn resolve_database_path(
    database_path: Option<PathBuf>,
    env_path: Option<&Path>,
) -> Result<PathBuf> {
    if let Some(path) = database_path {
        return Ok(path);
    }
    let file_vars = read_env_file(env_path.unwrap_or_else(|| Path::new(DEFAULT_ENV_PATH)))?;
    lookup_value("DATABASE_PATH", &file_vars, &env_var_string)
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("DATABASE_PATH not set"))
}

#[cfg(test)]
fn build_settings(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
) -> Result<RuntimeSettings> {
    build_settings_with_overrides(file_vars, env_lookup, RuntimeOverrides::default())
}

fn build_settings_with_overrides(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: RuntimeOverrides,
) -> Result<RuntimeSettings> {
    let database_path = overrides
        .database_path
        .map(|path| path.to_string_lossy().into_owned())
        .or_else(|| lookup_value("DATABASE_PATH", file_vars, &env_lookup))
        .ok_or_else(|| anyhow!("DATABASE_PATH not set"))?;
    let asset_root = overrides
        .asset_root
        .map(|path| path.to_string_lossy().into_owned())
        .or_else(|| lookup_value("ASSET_ROOT", file_vars, &env_lookup))
        .ok_or_else(|| anyhow!("ASSET_ROOT not set"))?;
    let port = overrides
        .port
        .or_else(|| {
            lookup_value("VIDTUBE_PORT", file_vars, &env_lookup)
                .and_then(|value| value.parse::<u16>().ok())
        })
        .unwrap_or(DEFAULT_VIDTUBE_PORT);
    let host = non_empty(overrides.host)
        .or_else(|| lookup_value("VIDTUBE_HOST", file_vars, &env_lookup))
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_VIDTUBE_HOST.to_string());
    let public_base_url = non_empty(overrides.public_base_url)
        .or_else(|| lookup_value("PUBLIC_BASE_URL", file_vars, &env_lookup))
        .map(|url| url.trim_end_matches('/').to_string())
        .unwrap_or_else(|| format!("http://{host}:{port}"));
    Ok(RuntimeSettings {
        database_path: PathBuf::from(database_path),
        asset_root: PathBuf::from(asset_root),
        public_base_url,
        port,
        host,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim().to_string();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}

fn env_var_string(key: &str) -> Option<String> {
    non_empty(env::var(key).ok())
}

fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key).or_else(|| file_vars.get(key).cloned())
}

pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    if !path.exists() {
        return Ok(vars);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        let Some((key, value_raw)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value_raw.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|value| value.strip_suffix('"'))
            .or_else(|| {
                value
                    .strip_prefix('\'')
                    .and_then(|value| value.strip_suffix('\''))
            })
            .unwrap_or(value);
        vars.insert(key.to_string(), value.to_string());
    }
    Ok(vars)
}
