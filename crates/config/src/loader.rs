use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::schema::PraxisConfig;

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["praxis.toml", "praxis.yaml", "praxis.yml", "praxis.json"];

/// Environment variables that override file settings.
pub const ENV_KDF_MEMORY_KIB: &str = "PRAXIS_KDF_MEMORY_KIB";
pub const ENV_KDF_ITERATIONS: &str = "PRAXIS_KDF_ITERATIONS";
pub const ENV_KDF_PARALLELISM: &str = "PRAXIS_KDF_PARALLELISM";
pub const ENV_AUTO_LOCK_MINUTES: &str = "PRAXIS_AUTO_LOCK_MINUTES";
pub const ENV_MIN_PASSWORD_LENGTH: &str = "PRAXIS_MIN_PASSWORD_LENGTH";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("unsupported config format: .{0}")]
    UnsupportedFormat(String),

    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },
}

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<PraxisConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&raw, path)
}

/// Load config from `explicit` if given, else from the standard locations,
/// then apply `PRAXIS_*` environment overrides.
///
/// An explicit path that cannot be loaded is an error. A discovered file
/// that cannot be loaded is logged and replaced by defaults.
pub fn load(explicit: Option<&Path>) -> Result<(PraxisConfig, Option<PathBuf>), ConfigError> {
    let (config, path) = match explicit {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            (load_config(path)?, Some(path.to_path_buf()))
        },
        None => {
            let path = find_config_file();
            (discover_and_load(), path)
        },
    };
    let config = apply_env_overrides(config, |name| std::env::var(name).ok())?;
    Ok((config, path))
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./praxis.{toml,yaml,yml,json}` (project-local)
/// 2. the user config dir, e.g. `~/.config/praxis/` (user-global)
///
/// Returns `PraxisConfig::default()` if no config file is found.
pub fn discover_and_load() -> PraxisConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    PraxisConfig::default()
}

/// Find the first config file in standard locations.
pub(crate) fn find_config_file() -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .or_else(|| find_in_dir(&config_dir()?))
}

fn find_in_dir(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory.
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "praxis").map(|d| d.config_dir().to_path_buf())
}

/// Overlay `PRAXIS_*` variables onto `config`. `lookup` resolves a variable
/// name to its value.
pub fn apply_env_overrides(
    mut config: PraxisConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<PraxisConfig, ConfigError> {
    let vault = &mut config.vault;

    if let Some(v) = env_number(&lookup, ENV_KDF_MEMORY_KIB)? {
        vault.kdf_memory_kib = v;
    }
    if let Some(v) = env_number(&lookup, ENV_KDF_ITERATIONS)? {
        vault.kdf_iterations = v;
    }
    if let Some(v) = env_number(&lookup, ENV_KDF_PARALLELISM)? {
        vault.kdf_parallelism = v;
    }
    if let Some(v) = env_number(&lookup, ENV_MIN_PASSWORD_LENGTH)? {
        vault.min_password_length = v;
    }
    if let Some(raw) = lookup(ENV_AUTO_LOCK_MINUTES) {
        vault.auto_lock_minutes = match raw.trim() {
            "off" | "0" => None,
            other => Some(other.parse().map_err(|_| ConfigError::InvalidEnv {
                var: ENV_AUTO_LOCK_MINUTES,
                value: raw.clone(),
            })?),
        };
    }

    Ok(config)
}

fn env_number<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    lookup(var)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|_| ConfigError::InvalidEnv { var, value: raw })
        })
        .transpose()
}

fn format_of(path: &Path) -> &str {
    path.extension().and_then(|e| e.to_str()).unwrap_or("toml")
}

pub(crate) fn parse_config(raw: &str, path: &Path) -> Result<PraxisConfig, ConfigError> {
    let parse_err = |message: String| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    };

    match format_of(path) {
        "toml" => toml::from_str(raw).map_err(|e| parse_err(e.to_string())),
        "yaml" | "yml" => serde_yaml::from_str(raw).map_err(|e| parse_err(e.to_string())),
        "json" => serde_json::from_str(raw).map_err(|e| parse_err(e.to_string())),
        ext => Err(ConfigError::UnsupportedFormat(ext.to_string())),
    }
}

/// Parse any supported format into a generic value tree.
pub(crate) fn parse_config_value(raw: &str, path: &Path) -> Result<serde_json::Value, ConfigError> {
    let parse_err = |message: String| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    };

    match format_of(path) {
        "toml" => {
            let v: toml::Value = toml::from_str(raw).map_err(|e| parse_err(e.to_string()))?;
            serde_json::to_value(v).map_err(|e| parse_err(e.to_string()))
        },
        "yaml" | "yml" => {
            let v: serde_yaml::Value =
                serde_yaml::from_str(raw).map_err(|e| parse_err(e.to_string()))?;
            serde_json::to_value(v).map_err(|e| parse_err(e.to_string()))
        },
        "json" => serde_json::from_str(raw).map_err(|e| parse_err(e.to_string())),
        ext => Err(ConfigError::UnsupportedFormat(ext.to_string())),
    }
}
