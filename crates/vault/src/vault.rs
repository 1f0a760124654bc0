//! Vault session state machine: unlock/lock, auto-lock, encrypt/decrypt.
//!
//! ```text
//! LOCKED --unlock--> UNLOCKING --ok--> UNLOCKED --lock / deadline--> LOCKED
//!                        \--err / lock / dropped--> LOCKED
//! ```
//!
//! The key is dropped inside the critical section that leaves `Unlocked`,
//! so when `lock()` returns no caller can still be holding it. `Locking` is
//! therefore never reported by [`Vault::status`]; it exists for front ends
//! that mirror a lock request still in transit.
//!
//! The unlocked private key lives only inside [`State::Unlocked`]. State is
//! kept behind a `std::sync::Mutex` whose guard is never held across an
//! `.await`, so `lock()` and the locked fast path never wait on crypto.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use {
    serde::{Deserialize, Serialize, de::DeserializeOwned},
    tokio::{sync::Notify, task::JoinHandle, time::Instant},
    zeroize::Zeroizing,
};

use crate::{
    error::VaultError,
    hybrid::{self, BlobMetadata, EncryptedBlob, EncryptedPayload},
    kdf::KdfParams,
    key_wrap::{self, WrappedPrivateKey},
    keys::{self, PrivateKey, PublicKey},
    traits::Cipher,
    xchacha20::XChaCha20Poly1305Cipher,
};

/// Vault status exposed to the API / frontend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VaultStatus {
    /// No private key in memory.
    Locked,
    /// A password is being checked.
    Unlocking,
    /// The private key is held in memory.
    Unlocked,
    /// The private key is being discarded. [`Vault`] never reports this
    /// itself because its `lock()` is atomic.
    Locking,
}

/// Session policy.
#[derive(Debug, Clone)]
pub struct VaultOptions {
    /// Work factor used when wrapping a new private key.
    pub kdf: KdfParams,
    /// Lock automatically this long after unlock or the last [`Vault::touch`].
    pub auto_lock: Option<Duration>,
    /// Minimum master password length enforced at key setup.
    pub min_password_length: usize,
}

impl Default for VaultOptions {
    fn default() -> Self {
        Self {
            kdf: KdfParams::default(),
            auto_lock: Some(Duration::from_secs(15 * 60)),
            min_password_length: 8,
        }
    }
}

/// What practice setup hands to the server storage collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeySetup {
    pub public_key: PublicKey,
    pub wrapped_private_key: WrappedPrivateKey,
}

enum State {
    Locked,
    Unlocking {
        attempt: u64,
    },
    Unlocked {
        key: PrivateKey,
        expires_at: Option<Instant>,
    },
}

struct Inner {
    state: State,
    /// Monotonic id of unlock attempts; tells a stale attempt from a live one.
    attempts: u64,
}

/// One vault session: holds the practice private key while unlocked.
///
/// Generic over [`Cipher`] but defaults to [`XChaCha20Poly1305Cipher`].
/// Share it as `Arc<Vault>`; there is no serialization path for its state.
pub struct Vault<C: Cipher = XChaCha20Poly1305Cipher> {
    cipher: Arc<C>,
    options: VaultOptions,
    inner: Mutex<Inner>,
    deadline_changed: Notify,
}

impl Vault<XChaCha20Poly1305Cipher> {
    /// Create a locked vault with the default cipher and options.
    pub fn new() -> Self {
        Self::with_options(XChaCha20Poly1305Cipher, VaultOptions::default())
    }
}

impl Default for Vault<XChaCha20Poly1305Cipher> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Cipher> std::fmt::Debug for Vault<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = match self.lock_inner().state {
            State::Locked => VaultStatus::Locked,
            State::Unlocking { .. } => VaultStatus::Unlocking,
            State::Unlocked { .. } => VaultStatus::Unlocked,
        };
        f.debug_struct("Vault")
            .field("status", &status)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<C: Cipher> Vault<C> {
    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: Cipher + 'static> Vault<C> {
    /// Create a locked vault with a custom cipher and policy.
    pub fn with_options(cipher: C, options: VaultOptions) -> Self {
        Self {
            cipher: Arc::new(cipher),
            options,
            inner: Mutex::new(Inner {
                state: State::Locked,
                attempts: 0,
            }),
            deadline_changed: Notify::new(),
        }
    }

    pub fn options(&self) -> &VaultOptions {
        &self.options
    }

    /// Drop the key if the auto-lock deadline has passed.
    fn expire(&self, inner: &mut Inner) {
        if let State::Unlocked {
            expires_at: Some(deadline),
            ..
        } = inner.state
        {
            if Instant::now() >= deadline {
                inner.state = State::Locked;

                #[cfg(feature = "tracing")]
                tracing::info!("vault auto-locked");
                #[cfg(feature = "metrics")]
                crate::telemetry::auto_lock();
            }
        }
    }

    fn expire_now(&self) {
        let mut inner = self.lock_inner();
        self.expire(&mut inner);
    }

    /// Current state, after applying any elapsed auto-lock.
    pub fn status(&self) -> VaultStatus {
        let mut inner = self.lock_inner();
        self.expire(&mut inner);
        match inner.state {
            State::Locked => VaultStatus::Locked,
            State::Unlocking { .. } => VaultStatus::Unlocking,
            State::Unlocked { .. } => VaultStatus::Unlocked,
        }
    }

    /// Whether the private key is currently in memory.
    pub fn is_unlocked(&self) -> bool {
        self.status() == VaultStatus::Unlocked
    }

    /// Time left before auto-lock, for display. `None` when locked or when
    /// auto-lock is disabled.
    pub fn time_until_auto_lock(&self) -> Option<Duration> {
        let mut inner = self.lock_inner();
        self.expire(&mut inner);
        match inner.state {
            State::Unlocked {
                expires_at: Some(deadline),
                ..
            } => Some(deadline.saturating_duration_since(Instant::now())),
            _ => None,
        }
    }

    /// Restart the auto-lock countdown after user activity.
    pub fn touch(&self) -> Result<(), VaultError> {
        {
            let mut inner = self.lock_inner();
            self.expire(&mut inner);
            match &mut inner.state {
                State::Unlocked { expires_at, .. } => {
                    *expires_at = self.options.auto_lock.map(|d| Instant::now() + d);
                },
                _ => return Err(VaultError::Locked),
            }
        }
        self.deadline_changed.notify_one();
        Ok(())
    }

    /// Generate the practice keypair and wrap its private key under `password`.
    ///
    /// Stateless: the vault stays in whatever state it was in. The private
    /// key is dropped (and zeroized) as soon as it has been wrapped.
    pub async fn generate_key_pair(&self, password: &str) -> Result<KeySetup, VaultError> {
        if password.chars().count() < self.options.min_password_length {
            return Err(VaultError::InvalidInput(format!(
                "password must be at least {} characters",
                self.options.min_password_length
            )));
        }

        let cipher = Arc::clone(&self.cipher);
        let kdf = self.options.kdf;
        let password = Zeroizing::new(password.to_owned());
        let setup = run_blocking(move || {
            let pair = keys::generate_key_pair()?;
            let wrapped_private_key =
                key_wrap::wrap_private_key(cipher.as_ref(), &pair.private_key, &password, &kdf)?;
            Ok(KeySetup {
                public_key: pair.public_key,
                wrapped_private_key,
            })
        })
        .await?;

        #[cfg(feature = "tracing")]
        tracing::info!("practice keypair generated");

        Ok(setup)
    }

    /// Unlock the vault with the stored wrapped key and the master password.
    ///
    /// First call wins: while one unlock is in flight, others fail with
    /// [`VaultError::Busy`]. A `lock()` during the attempt discards its
    /// result ([`VaultError::Cancelled`]); dropping the future returns the
    /// vault to `Locked`.
    pub async fn unlock(&self, wrapped: &WrappedPrivateKey, password: &str) -> Result<(), VaultError> {
        if password.is_empty() {
            return Err(VaultError::InvalidInput("password must not be empty".into()));
        }

        let attempt = self.begin_unlock()?;
        let pending = PendingUnlock {
            vault: self,
            attempt,
            settled: false,
        };

        let cipher = Arc::clone(&self.cipher);
        let wrapped = wrapped.clone();
        let password = Zeroizing::new(password.to_owned());
        let result =
            run_blocking(move || key_wrap::unwrap_private_key(cipher.as_ref(), &wrapped, &password))
                .await;

        pending.settle(result)
    }

    fn begin_unlock(&self) -> Result<u64, VaultError> {
        let mut inner = self.lock_inner();
        self.expire(&mut inner);
        match inner.state {
            State::Locked => {},
            State::Unlocked { .. } => return Err(VaultError::AlreadyUnlocked),
            State::Unlocking { .. } => return Err(VaultError::Busy),
        }
        inner.attempts += 1;
        let attempt = inner.attempts;
        inner.state = State::Unlocking { attempt };
        Ok(attempt)
    }

    /// Discard the private key. Idempotent; also cancels an in-flight unlock.
    ///
    /// The key is zeroized before the state lock is released, so it is gone
    /// by the time any concurrent `lock()` returns.
    pub fn lock(&self) {
        {
            let mut inner = self.lock_inner();
            let previous = std::mem::replace(&mut inner.state, State::Locked);
            if matches!(previous, State::Unlocked { .. }) {
                drop(previous);

                #[cfg(feature = "tracing")]
                tracing::info!("vault locked");
            }
        }

        self.deadline_changed.notify_one();
    }

    /// Run `f` with the unlocked key, or fail fast if locked.
    fn with_key<R>(
        &self,
        f: impl FnOnce(&PrivateKey) -> Result<R, VaultError>,
    ) -> Result<R, VaultError> {
        let mut inner = self.lock_inner();
        self.expire(&mut inner);
        match &inner.state {
            State::Unlocked { key, .. } => f(key),
            _ => Err(VaultError::Locked),
        }
    }

    /// Encrypt a structured value for `recipient`. Does not need the vault
    /// to be unlocked.
    pub fn encrypt_for<T: Serialize + ?Sized>(
        &self,
        recipient: &PublicKey,
        value: &T,
    ) -> Result<EncryptedPayload, VaultError> {
        hybrid::encrypt_value(self.cipher.as_ref(), value, recipient)
    }

    /// Encrypt raw bytes for `recipient`. Does not need the vault unlocked.
    pub fn encrypt_bytes_for(
        &self,
        recipient: &PublicKey,
        data: &[u8],
    ) -> Result<EncryptedPayload, VaultError> {
        hybrid::encrypt_bytes(self.cipher.as_ref(), data, recipient)
    }

    /// Encrypt a binary object for `recipient` off the async runtime.
    pub async fn encrypt_blob_for(
        &self,
        recipient: &PublicKey,
        data: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<EncryptedBlob, VaultError> {
        let cipher = Arc::clone(&self.cipher);
        let recipient = *recipient;
        run_blocking(move || {
            hybrid::encrypt_blob(cipher.as_ref(), &data, content_type.as_deref(), &recipient)
        })
        .await
    }

    /// Decrypt a payload to raw bytes. Requires `Unlocked`.
    pub fn decrypt_bytes(
        &self,
        payload: &EncryptedPayload,
    ) -> Result<Zeroizing<Vec<u8>>, VaultError> {
        let session_key =
            self.with_key(|key| hybrid::open_payload_key(self.cipher.as_ref(), payload, key));
        observe(session_key.and_then(|session_key| {
            hybrid::decrypt_with_session_key(self.cipher.as_ref(), payload, &session_key)
        }))
    }

    /// Decrypt a payload back to `T`. Requires `Unlocked`.
    pub fn decrypt<T: DeserializeOwned>(&self, payload: &EncryptedPayload) -> Result<T, VaultError> {
        let plaintext = self.decrypt_bytes(payload)?;
        observe(hybrid::parse_value(&plaintext))
    }

    /// Decrypt a blob stream using its metadata sidecar. Requires `Unlocked`.
    ///
    /// Only the session-key unseal touches the private key; the bulk pass
    /// runs on the blocking pool.
    pub async fn decrypt_blob(
        &self,
        metadata: &BlobMetadata,
        ciphertext: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, VaultError> {
        let session_key =
            observe(self.with_key(|key| hybrid::open_blob_key(self.cipher.as_ref(), metadata, key)))?;

        let cipher = Arc::clone(&self.cipher);
        let metadata = metadata.clone();
        let ciphertext = ciphertext.to_vec();
        observe(
            run_blocking(move || {
                hybrid::decrypt_blob_with_session_key(
                    cipher.as_ref(),
                    &metadata,
                    &ciphertext,
                    &session_key,
                )
            })
            .await,
        )
    }

    /// Decrypt a list of stored fields, isolating per-item failures.
    ///
    /// Fails as a whole only when the vault is locked up front.
    pub fn decrypt_batch<T: DeserializeOwned>(
        &self,
        payloads: &[EncryptedPayload],
    ) -> Result<Vec<Result<T, VaultError>>, VaultError> {
        if !self.is_unlocked() {
            return Err(VaultError::Locked);
        }

        let results: Vec<Result<T, VaultError>> =
            payloads.iter().map(|payload| self.decrypt(payload)).collect();

        #[cfg(feature = "tracing")]
        for (index, result) in results.iter().enumerate() {
            if let Err(e) = result {
                tracing::warn!(index, error = %e, "record could not be decrypted");
            }
        }

        Ok(results)
    }

    /// Decrypt stored fields to display strings; failed items become
    /// `placeholder`.
    pub fn decrypt_for_display(
        &self,
        payloads: &[EncryptedPayload],
        placeholder: &str,
    ) -> Result<Vec<String>, VaultError> {
        Ok(self
            .decrypt_batch::<serde_json::Value>(payloads)?
            .into_iter()
            .map(|item| match item {
                Ok(serde_json::Value::String(text)) => text,
                Ok(other) => other.to_string(),
                Err(_) => placeholder.to_owned(),
            })
            .collect())
    }

    fn auto_lock_deadline(&self) -> Option<Instant> {
        match self.lock_inner().state {
            State::Unlocked { expires_at, .. } => expires_at,
            _ => None,
        }
    }

    /// Spawn a task that locks the vault as soon as its deadline passes,
    /// even if nothing else calls into it. Abort the handle on teardown.
    pub fn spawn_auto_lock(self: &Arc<Self>) -> JoinHandle<()> {
        let vault = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match vault.auto_lock_deadline() {
                    Some(deadline) => {
                        tokio::select! {
                            () = tokio::time::sleep_until(deadline) => vault.expire_now(),
                            () = vault.deadline_changed.notified() => {},
                        }
                    },
                    None => vault.deadline_changed.notified().await,
                }
            }
        })
    }
}

/// Resets the vault to `Locked` if an unlock future is dropped mid-flight.
struct PendingUnlock<'a, C: Cipher + 'static> {
    vault: &'a Vault<C>,
    attempt: u64,
    settled: bool,
}

impl<C: Cipher + 'static> PendingUnlock<'_, C> {
    fn is_current(&self, inner: &Inner) -> bool {
        matches!(inner.state, State::Unlocking { attempt } if attempt == self.attempt)
    }

    fn settle(mut self, result: Result<PrivateKey, VaultError>) -> Result<(), VaultError> {
        self.settled = true;
        let vault = self.vault;
        let mut inner = vault.lock_inner();

        if !self.is_current(&inner) {
            // lock() ran while the password was being checked.
            drop(inner);
            drop(result);

            #[cfg(feature = "tracing")]
            tracing::debug!("unlock discarded after concurrent lock");
            #[cfg(feature = "metrics")]
            crate::telemetry::unlock("cancelled");

            return Err(VaultError::Cancelled);
        }

        match result {
            Ok(key) => {
                inner.state = State::Unlocked {
                    key,
                    expires_at: vault.options.auto_lock.map(|d| Instant::now() + d),
                };
                drop(inner);
                vault.deadline_changed.notify_one();

                #[cfg(feature = "tracing")]
                tracing::info!("vault unlocked");
                #[cfg(feature = "metrics")]
                crate::telemetry::unlock("success");

                Ok(())
            },
            Err(e) => {
                inner.state = State::Locked;

                #[cfg(feature = "tracing")]
                tracing::warn!(error = %e, "vault unlock failed");
                #[cfg(feature = "metrics")]
                crate::telemetry::unlock("failure");

                Err(e)
            },
        }
    }
}

impl<C: Cipher + 'static> Drop for PendingUnlock<'_, C> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut inner = self.vault.lock_inner();
        if self.is_current(&inner) {
            inner.state = State::Locked;
        }
    }
}

/// Run CPU-heavy crypto on the blocking pool. A panicked or aborted task
/// counts as a failed operation with nothing kept.
async fn run_blocking<T, F>(f: F) -> Result<T, VaultError>
where
    F: FnOnce() -> Result<T, VaultError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|_| VaultError::Cancelled)?
}

fn observe<T>(result: Result<T, VaultError>) -> Result<T, VaultError> {
    #[cfg(feature = "metrics")]
    if let Err(e) = &result {
        if !e.is_locked() {
            crate::telemetry::decrypt_failure();
        }
    }
    result
}
