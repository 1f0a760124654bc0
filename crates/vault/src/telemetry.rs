//! Metric names emitted through the `metrics` facade.
//!
//! No recorder is installed here; the embedding application owns that.

/// Unlock attempts, labelled `outcome` = `success` | `failure` | `cancelled`.
pub const UNLOCK_TOTAL: &str = "praxis_vault_unlock_total";

/// Payload or blob decryptions that failed while unlocked.
pub const DECRYPT_FAILURES_TOTAL: &str = "praxis_vault_decrypt_failures_total";

/// Transitions to locked caused by the auto-lock deadline.
pub const AUTO_LOCK_TOTAL: &str = "praxis_vault_auto_lock_total";

pub fn unlock(outcome: &'static str) {
    ::metrics::counter!(UNLOCK_TOTAL, "outcome" => outcome).increment(1);
}

pub fn decrypt_failure() {
    ::metrics::counter!(DECRYPT_FAILURES_TOTAL).increment(1);
}

pub fn auto_lock() {
    ::metrics::counter!(AUTO_LOCK_TOTAL).increment(1);
}
