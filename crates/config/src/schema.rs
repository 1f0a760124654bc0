/// Config schema types.
use std::time::Duration;

use {
    praxis_vault::{KdfParams, VaultOptions},
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PraxisConfig {
    pub vault: VaultConfig,
}

/// Vault session and key-wrapping policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Argon2id memory cost in KiB.
    pub kdf_memory_kib: u32,
    /// Argon2id passes.
    pub kdf_iterations: u32,
    /// Argon2id lanes.
    pub kdf_parallelism: u32,
    /// Minutes of inactivity before the vault locks itself. `None` disables
    /// auto-lock.
    pub auto_lock_minutes: Option<u64>,
    /// Minimum master password length accepted at key setup.
    pub min_password_length: usize,
}

impl Default for VaultConfig {
    fn default() -> Self {
        let kdf = KdfParams::default();
        Self {
            kdf_memory_kib: kdf.m_cost,
            kdf_iterations: kdf.t_cost,
            kdf_parallelism: kdf.p_cost,
            auto_lock_minutes: Some(15),
            min_password_length: 8,
        }
    }
}

impl VaultConfig {
    pub fn kdf_params(&self) -> KdfParams {
        KdfParams {
            m_cost: self.kdf_memory_kib,
            t_cost: self.kdf_iterations,
            p_cost: self.kdf_parallelism,
        }
    }

    pub fn auto_lock(&self) -> Option<Duration> {
        self.auto_lock_minutes
            .filter(|&minutes| minutes > 0)
            .map(|minutes| Duration::from_secs(minutes.saturating_mul(60)))
    }

    /// Session options for a [`praxis_vault::Vault`].
    pub fn to_vault_options(&self) -> VaultOptions {
        VaultOptions {
            kdf: self.kdf_params(),
            auto_lock: self.auto_lock(),
            min_password_length: self.min_password_length,
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_vault_defaults() {
        let cfg = VaultConfig::default();
        assert_eq!(cfg.kdf_params(), KdfParams::default());
        assert_eq!(cfg.auto_lock(), Some(Duration::from_secs(15 * 60)));
        assert_eq!(cfg.min_password_length, 8);
    }

    #[test]
    fn zero_minutes_disables_auto_lock() {
        let cfg = VaultConfig {
            auto_lock_minutes: Some(0),
            ..Default::default()
        };
        assert!(cfg.auto_lock().is_none());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: PraxisConfig = toml::from_str("[vault]\nkdf_iterations = 4\n").unwrap();
        assert_eq!(cfg.vault.kdf_iterations, 4);
        assert_eq!(cfg.vault.kdf_memory_kib, 65536);
        assert_eq!(cfg.vault.auto_lock_minutes, Some(15));
    }

    #[test]
    fn options_carry_all_fields() {
        let cfg = VaultConfig {
            kdf_memory_kib: 19456,
            kdf_iterations: 2,
            kdf_parallelism: 1,
            auto_lock_minutes: None,
            min_password_length: 12,
        };
        let options = cfg.to_vault_options();
        assert_eq!(options.kdf.m_cost, 19456);
        assert_eq!(options.kdf.t_cost, 2);
        assert!(options.auto_lock.is_none());
        assert_eq!(options.min_password_length, 12);
    }
}
