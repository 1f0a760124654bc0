//! Configuration loading, environment overrides, and validation.
//!
//! Config files: `praxis.toml`, `praxis.yaml`, or `praxis.json`
//! Searched in `./` then the user config dir (e.g. `~/.config/praxis/`).
//!
//! `PRAXIS_*` environment variables override file values.

pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{ConfigError, apply_env_overrides, config_dir, discover_and_load, load, load_config},
    schema::{PraxisConfig, VaultConfig},
    validate::{Diagnostic, Severity, ValidationResult, validate, validate_file},
};
