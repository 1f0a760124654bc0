//! Configuration validation engine.
//!
//! Validates config files against the known schema, detects
//! unknown/misspelled fields, and reports weak security settings.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use crate::{
    loader::{self, ConfigError},
    schema::PraxisConfig,
};

/// Argon2id memory below this (19 MiB) is under the OWASP minimum.
const MIN_RECOMMENDED_MEMORY_KIB: u32 = 19 * 1024;
const MIN_RECOMMENDED_ITERATIONS: u32 = 2;
const MIN_RECOMMENDED_PASSWORD_LENGTH: usize = 8;
const LONG_AUTO_LOCK_MINUTES: u64 = 60;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "syntax", "unknown-field", "type-error", "env", "kdf",
    /// "password-policy", "session", "file-ref"
    pub category: &'static str,
    /// Dotted path, e.g. "vault.kdf_iterations"
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn new(
        severity: Severity,
        category: &'static str,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result of validating a configuration file.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

// ── Schema tree for unknown-field detection ─────────────────────────────────

enum KnownKeys {
    Struct(HashMap<&'static str, KnownKeys>),
    Leaf,
}

fn build_schema_map() -> KnownKeys {
    use KnownKeys::{Leaf, Struct};

    Struct(HashMap::from([(
        "vault",
        Struct(HashMap::from([
            ("kdf_memory_kib", Leaf),
            ("kdf_iterations", Leaf),
            ("kdf_parallelism", Leaf),
            ("auto_lock_minutes", Leaf),
            ("min_password_length", Leaf),
        ])),
    )]))
}

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_chars.len()]
}

/// Closest candidate within `max_distance` edits, if any.
fn suggest<'a>(needle: &str, candidates: &[&'a str], max_distance: usize) -> Option<&'a str> {
    candidates
        .iter()
        .map(|&c| (c, levenshtein(needle, c)))
        .filter(|&(_, d)| d > 0 && d <= max_distance)
        .min_by_key(|&(_, d)| d)
        .map(|(c, _)| c)
}

// ── Core validation ─────────────────────────────────────────────────────────

/// Validate a config file at the given path, or discover the default config
/// file location if `path` is `None`. `PRAXIS_*` environment overrides are
/// applied before the semantic checks.
#[must_use]
pub fn validate_file(path: Option<&Path>) -> ValidationResult {
    validate_file_with_env(path, |name| std::env::var(name).ok())
}

fn validate_file_with_env(
    path: Option<&Path>,
    lookup: impl Fn(&str) -> Option<String>,
) -> ValidationResult {
    let config_path = path.map(Path::to_path_buf).or_else(loader::find_config_file);

    let Some(actual_path) = config_path else {
        let mut diagnostics = vec![Diagnostic::new(
            Severity::Info,
            "file-ref",
            "",
            "no config file found; using defaults",
        )];
        match loader::apply_env_overrides(PraxisConfig::default(), lookup) {
            Ok(config) => diagnostics.extend(validate(&config)),
            Err(e) => diagnostics.push(env_diagnostic(&e)),
        }
        return ValidationResult {
            diagnostics,
            config_path: None,
        };
    };

    let mut result = match std::fs::read_to_string(&actual_path) {
        Ok(content) => validate_str(&content, &actual_path, lookup),
        Err(e) => ValidationResult {
            diagnostics: vec![Diagnostic::new(
                Severity::Error,
                "syntax",
                "",
                format!("failed to read config file: {e}"),
            )],
            config_path: None,
        },
    };
    result.config_path = Some(actual_path);
    result
}

/// Validate config text; `path` only selects the format.
fn validate_str(
    raw: &str,
    path: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> ValidationResult {
    let mut diagnostics = Vec::new();

    // 1. Syntax
    let value = match loader::parse_config_value(raw, path) {
        Ok(v) => v,
        Err(e) => {
            diagnostics.push(Diagnostic::new(Severity::Error, "syntax", "", e.to_string()));
            return ValidationResult {
                diagnostics,
                config_path: None,
            };
        },
    };

    // 2. Unknown fields
    check_unknown_fields(&value, &build_schema_map(), "", &mut diagnostics);

    // 3. Types, then semantics on the overridden config
    match loader::parse_config(raw, path) {
        Ok(config) => match loader::apply_env_overrides(config, lookup) {
            Ok(config) => diagnostics.extend(validate(&config)),
            Err(e) => diagnostics.push(env_diagnostic(&e)),
        },
        Err(e) => diagnostics.push(Diagnostic::new(
            Severity::Error,
            "type-error",
            "",
            format!("type error: {e}"),
        )),
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

fn env_diagnostic(err: &ConfigError) -> Diagnostic {
    let path = match err {
        ConfigError::InvalidEnv { var, .. } => (*var).to_string(),
        _ => String::new(),
    };
    Diagnostic::new(Severity::Error, "env", path, err.to_string())
}

fn check_unknown_fields(
    value: &serde_json::Value,
    schema: &KnownKeys,
    prefix: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let (serde_json::Value::Object(table), KnownKeys::Struct(fields)) = (value, schema) else {
        return;
    };

    let known_keys: Vec<&str> = fields.keys().copied().collect();
    for (key, child_value) in table {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        if let Some(child_schema) = fields.get(key.as_str()) {
            check_unknown_fields(child_value, child_schema, &path, diagnostics);
            continue;
        }

        let level = if prefix.is_empty() {
            " at top level"
        } else {
            ""
        };
        let message = match suggest(key, &known_keys, 3) {
            Some(s) => format!("unknown field{level} (did you mean \"{s}\"?)"),
            None => format!("unknown field{level}"),
        };
        diagnostics.push(Diagnostic::new(Severity::Error, "unknown-field", path, message));
    }
}

/// Semantic checks on a parsed config.
#[must_use]
pub fn validate(config: &PraxisConfig) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let vault = &config.vault;

    if let Err(e) = vault.kdf_params().validate() {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "kdf",
            "vault",
            e.to_string(),
        ));
    }

    if vault.kdf_memory_kib < MIN_RECOMMENDED_MEMORY_KIB {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "kdf",
            "vault.kdf_memory_kib",
            format!(
                "{} KiB is below the recommended minimum of {MIN_RECOMMENDED_MEMORY_KIB} KiB",
                vault.kdf_memory_kib
            ),
        ));
    }

    if vault.kdf_iterations < MIN_RECOMMENDED_ITERATIONS {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "kdf",
            "vault.kdf_iterations",
            format!("fewer than {MIN_RECOMMENDED_ITERATIONS} iterations weakens password hashing"),
        ));
    }

    if vault.min_password_length < MIN_RECOMMENDED_PASSWORD_LENGTH {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "password-policy",
            "vault.min_password_length",
            format!(
                "master passwords shorter than {MIN_RECOMMENDED_PASSWORD_LENGTH} characters are allowed"
            ),
        ));
    }

    match vault.auto_lock_minutes {
        None | Some(0) => diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "session",
            "vault.auto_lock_minutes",
            "auto-lock is disabled; the private key stays in memory until an explicit lock",
        )),
        Some(minutes) if minutes > LONG_AUTO_LOCK_MINUTES => {
            diagnostics.push(Diagnostic::new(
                Severity::Info,
                "session",
                "vault.auto_lock_minutes",
                format!("auto-lock after {minutes} minutes of inactivity"),
            ));
        },
        Some(_) => {},
    }

    diagnostics
}
