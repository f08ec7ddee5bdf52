use std::path::{Path, PathBuf};

use anyhow::Context;

use super::types::AppConfig;

pub const ENV_MAX_CONCURRENT_AGENTS: &str = "CONDUCTOR_MAX_CONCURRENT_AGENTS";
pub const ENV_TIMEOUT_MS: &str = "CONDUCTOR_TIMEOUT_MS";
pub const ENV_RETRY_ATTEMPTS: &str = "CONDUCTOR_RETRY_ATTEMPTS";
pub const ENV_LOG_LEVEL: &str = "CONDUCTOR_LOG_LEVEL";

/// Get the default conductor data directory: ~/.conductor
pub fn get_conductor_data_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(PathBuf::from(home).join(".conductor"))
}

pub fn load_from_path(path: &Path) -> anyhow::Result<AppConfig> {
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    toml::from_str::<AppConfig>(&s).with_context(|| format!("parse config {}", path.display()))
}

/// Load configuration, then apply environment overrides.
///
/// Priority: `explicit` path, `~/.conductor/config.toml`, `./conductor.toml`,
/// built-in defaults.
pub fn load(explicit: Option<&Path>) -> anyhow::Result<AppConfig> {
    let mut cfg = match explicit {
        Some(path) => load_from_path(path)?,
        None => {
            let user_config = get_conductor_data_dir()
                .ok()
                .map(|dir| dir.join("config.toml"))
                .filter(|p| p.exists());
            let local_config = Path::new("conductor.toml");

            if let Some(path) = user_config {
                load_from_path(&path)?
            } else if local_config.exists() {
                load_from_path(local_config)?
            } else {
                AppConfig::default()
            }
        }
    };

    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok())?;
    Ok(cfg)
}

pub fn load_default() -> anyhow::Result<AppConfig> {
    load(None)
}

/// Apply `CONDUCTOR_*` overrides read through `lookup`. Blank values are ignored.
pub fn apply_env_overrides<F>(cfg: &mut AppConfig, lookup: F) -> anyhow::Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get(ENV_MAX_CONCURRENT_AGENTS) {
        cfg.runtime.max_concurrent_agents = v
            .trim()
            .parse()
            .with_context(|| format!("{ENV_MAX_CONCURRENT_AGENTS}={v}"))?;
    }
    if let Some(v) = get(ENV_TIMEOUT_MS) {
        cfg.runtime.timeout_ms = v
            .trim()
            .parse()
            .with_context(|| format!("{ENV_TIMEOUT_MS}={v}"))?;
    }
    if let Some(v) = get(ENV_RETRY_ATTEMPTS) {
        cfg.runtime.retry_attempts = v
            .trim()
            .parse()
            .with_context(|| format!("{ENV_RETRY_ATTEMPTS}={v}"))?;
    }
    if let Some(v) = get(ENV_LOG_LEVEL) {
        cfg.logging.level = v.trim().to_string();
    }
    Ok(())
}
