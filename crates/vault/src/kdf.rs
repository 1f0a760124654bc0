//! Argon2id key derivation for password → KEK.

use {argon2::Argon2, rand::RngCore, zeroize::Zeroizing};

use crate::{KEY_LEN, SALT_LEN, error::VaultError};

/// Upper bound on stored memory cost (256 MiB). Wrapped keys come back from
/// the server, and a browser-class client must survive a hostile record.
const MAX_M_COST: u32 = 256 * 1024;
const MAX_T_COST: u32 = 64;
const MAX_P_COST: u32 = 16;

/// Argon2id parameters stored alongside the wrapped private key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KdfParams {
    /// Memory cost in KiB (default: 64 MiB = 65536).
    pub m_cost: u32,
    /// Number of iterations (default: 3).
    pub t_cost: u32,
    /// Degree of parallelism (default: 1).
    pub p_cost: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            m_cost: 65536, // 64 MiB
            t_cost: 3,
            p_cost: 1,
        }
    }
}

impl KdfParams {
    /// Check the parameters are accepted by Argon2 and below the vault ceiling.
    pub fn validate(&self) -> Result<(), VaultError> {
        if self.m_cost > MAX_M_COST || self.t_cost > MAX_T_COST || self.p_cost > MAX_P_COST {
            return Err(VaultError::InvalidInput(format!(
                "KDF params exceed limits (m_cost <= {MAX_M_COST}, t_cost <= {MAX_T_COST}, p_cost <= {MAX_P_COST})"
            )));
        }
        self.to_argon2().map(|_| ())
    }

    fn to_argon2(self) -> Result<argon2::Params, VaultError> {
        argon2::Params::new(self.m_cost, self.t_cost, self.p_cost, Some(KEY_LEN))
            .map_err(|e| VaultError::InvalidInput(format!("invalid KDF params: {e}")))
    }
}

/// Derive a 256-bit key from a password and salt using Argon2id.
///
/// Deterministic for identical inputs. The password is only borrowed and
/// nothing derived from it outlives the returned key.
pub fn derive_key(
    password: &str,
    salt: &[u8],
    params: &KdfParams,
) -> Result<Zeroizing<[u8; KEY_LEN]>, VaultError> {
    if password.is_empty() {
        return Err(VaultError::InvalidInput("password must not be empty".into()));
    }
    if salt.len() != SALT_LEN {
        return Err(VaultError::InvalidInput(format!(
            "salt must be {SALT_LEN} bytes, got {}",
            salt.len()
        )));
    }
    params.validate()?;

    let argon2 = Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        params.to_argon2()?,
    );

    let mut output = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into(password.as_bytes(), salt, output.as_mut())
        .map_err(|e| VaultError::InvalidInput(format!("KDF failed: {e}")))?;

    Ok(output)
}

/// Generate a random salt.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    salt
}
