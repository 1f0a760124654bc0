//! Vault subcommands: key setup, encryption, and unlock-decrypt-lock flows.
//!
//! File formats are the serde shapes of `praxis-vault`: `KeySetup`,
//! `EncryptedPayload`, and `BlobMetadata`, all JSON.

use std::{
    io::{Read, Write},
    path::{Path, PathBuf},
};

use {
    anyhow::{Context, Result, bail},
    clap::{Args, Subcommand},
    praxis_config::PraxisConfig,
    praxis_vault::{
        BlobMetadata, EncryptedPayload, KeySetup, Vault, VaultError, XChaCha20Poly1305Cipher,
    },
    secrecy::{ExposeSecret, Secret},
    serde::{Serialize, de::DeserializeOwned},
    tracing::{debug, info},
};

#[derive(Subcommand)]
pub enum VaultAction {
    /// Generate the practice keypair and write it, password-wrapped, to a file.
    Keygen {
        /// Where to write the key setup JSON.
        #[arg(long)]
        out: PathBuf,
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
        #[command(flatten)]
        password: PasswordArgs,
    },
    /// Encrypt a JSON value for the practice.
    Encrypt {
        /// Key setup JSON (only the public key is used).
        #[arg(long)]
        keys: PathBuf,
        /// JSON input file; stdin when omitted.
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Encrypt a binary file (e.g. a photo) for the practice.
    EncryptBlob {
        #[arg(long)]
        keys: PathBuf,
        #[arg(long)]
        input: PathBuf,
        /// MIME type, authenticated alongside the data.
        #[arg(long)]
        content_type: Option<String>,
        /// Where to write the metadata JSON.
        #[arg(long)]
        meta_out: PathBuf,
        /// Where to write the encrypted stream.
        #[arg(long)]
        data_out: PathBuf,
    },
    /// Unlock, decrypt one payload to stdout, lock.
    Decrypt {
        #[arg(long)]
        keys: PathBuf,
        /// Encrypted payload JSON.
        #[arg(long)]
        payload: PathBuf,
        #[command(flatten)]
        password: PasswordArgs,
    },
    /// Unlock, decrypt a blob to a file, lock.
    DecryptBlob {
        #[arg(long)]
        keys: PathBuf,
        #[arg(long)]
        meta: PathBuf,
        #[arg(long)]
        data: PathBuf,
        #[arg(long)]
        out: PathBuf,
        #[command(flatten)]
        password: PasswordArgs,
    },
    /// Unlock, decrypt a JSON array of payloads (one line per item), lock.
    DecryptBatch {
        #[arg(long)]
        keys: PathBuf,
        #[arg(long)]
        payloads: PathBuf,
        /// Printed in place of items that fail to decrypt.
        #[arg(long, default_value = "[unable to decrypt]")]
        placeholder: String,
        #[command(flatten)]
        password: PasswordArgs,
    },
}

#[derive(Args)]
pub struct PasswordArgs {
    /// Master password. Prompted for when omitted.
    #[arg(long, env = "PRAXIS_VAULT_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

impl PasswordArgs {
    fn resolve(self, confirm: bool) -> Result<Secret<String>> {
        if let Some(password) = self.password {
            return Ok(Secret::new(password));
        }

        let password = Secret::new(rpassword::prompt_password("Master password: ")?);
        if confirm {
            let again = Secret::new(rpassword::prompt_password("Repeat password: ")?);
            if again.expose_secret() != password.expose_secret() {
                bail!("passwords do not match");
            }
        }
        Ok(password)
    }
}

pub async fn handle_vault(action: VaultAction, config: &PraxisConfig) -> Result<()> {
    let vault = Vault::with_options(XChaCha20Poly1305Cipher, config.vault.to_vault_options());

    match action {
        VaultAction::Keygen {
            out,
            force,
            password,
        } => keygen(&vault, &out, force, password.resolve(true)?).await,
        VaultAction::Encrypt { keys, input } => {
            let setup: KeySetup = read_json(&keys)?;
            let value: serde_json::Value = match input {
                Some(path) => read_json(&path)?,
                None => {
                    let mut raw = String::new();
                    std::io::stdin().read_to_string(&mut raw)?;
                    serde_json::from_str(&raw).context("stdin is not valid JSON")?
                },
            };
            let payload = vault.encrypt_for(&setup.public_key, &value)?;
            println!("{}", serde_json::to_string_pretty(&payload)?);
            Ok(())
        },
        VaultAction::EncryptBlob {
            keys,
            input,
            content_type,
            meta_out,
            data_out,
        } => {
            let setup: KeySetup = read_json(&keys)?;
            let data =
                std::fs::read(&input).with_context(|| format!("failed to read {}", input.display()))?;
            let blob = vault
                .encrypt_blob_for(&setup.public_key, data, content_type)
                .await?;
            write_json(&meta_out, &blob.metadata)?;
            std::fs::write(&data_out, &blob.ciphertext)
                .with_context(|| format!("failed to write {}", data_out.display()))?;
            info!(bytes = blob.metadata.size, "blob encrypted");
            Ok(())
        },
        VaultAction::Decrypt {
            keys,
            payload,
            password,
        } => {
            let payload: EncryptedPayload = read_json(&payload)?;
            let value = with_unlocked(&vault, &keys, password, |vault| {
                Ok(vault.decrypt::<serde_json::Value>(&payload)?)
            })
            .await?;
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        },
        VaultAction::DecryptBlob {
            keys,
            meta,
            data,
            out,
            password,
        } => {
            let metadata: BlobMetadata = read_json(&meta)?;
            let ciphertext =
                std::fs::read(&data).with_context(|| format!("failed to read {}", data.display()))?;

            unlock(&vault, &keys, password).await?;
            let plaintext = vault.decrypt_blob(&metadata, &ciphertext).await;
            vault.lock();

            std::fs::write(&out, plaintext?.as_slice())
                .with_context(|| format!("failed to write {}", out.display()))?;
            Ok(())
        },
        VaultAction::DecryptBatch {
            keys,
            payloads,
            placeholder,
            password,
        } => {
            let payloads: Vec<EncryptedPayload> = read_json(&payloads)?;
            let lines = with_unlocked(&vault, &keys, password, |vault| {
                Ok(vault.decrypt_for_display(&payloads, &placeholder)?)
            })
            .await?;
            let mut stdout = std::io::stdout().lock();
            for line in lines {
                writeln!(stdout, "{line}")?;
            }
            Ok(())
        },
    }
}

async fn keygen(vault: &Vault, out: &Path, force: bool, password: Secret<String>) -> Result<()> {
    if out.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", out.display());
    }

    let setup = vault.generate_key_pair(password.expose_secret()).await?;
    write_json(out, &setup)?;

    info!(path = %out.display(), "key setup written");
    eprintln!("Public key: {}", setup.public_key.to_jwk().x);
    Ok(())
}

async fn unlock(vault: &Vault, keys: &Path, password: PasswordArgs) -> Result<()> {
    let setup: KeySetup = read_json(keys)?;
    let password = password.resolve(false)?;
    vault
        .unlock(&setup.wrapped_private_key, password.expose_secret())
        .await
        .map_err(|e| {
            if matches!(e, VaultError::WrongPasswordOrCorruptData) {
                anyhow::anyhow!(e.user_message())
            } else {
                e.into()
            }
        })
}

/// Unlock, run `f`, and lock again whatever `f` returned.
async fn with_unlocked<T>(
    vault: &Vault,
    keys: &Path,
    password: PasswordArgs,
    f: impl FnOnce(&Vault) -> Result<T>,
) -> Result<T> {
    unlock(vault, keys, password).await?;
    let result = f(vault);
    vault.lock();
    debug!("vault locked after command");
    result
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}
