//! In-memory secret sources
//!
//! Both count how often they were asked, which is how the cache tests tell
//! a cache hit from a fetch.

use anyhow::{Result, bail};
use parking_lot::Mutex;
use shieldgate_common::{SecretPayload, SecretSource};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Serves a fixed payload for any secret id
#[derive(Debug)]
pub struct StaticSecretSource {
    payload: Mutex<SecretPayload>,
    calls: AtomicUsize,
}

impl StaticSecretSource {
    pub fn new(header_name: &str, value: &str) -> Self {
        Self {
            payload: Mutex::new(SecretPayload::new(header_name, value)),
            calls: AtomicUsize::new(0),
        }
    }

    /// Swap the value, as a rotation would
    pub fn rotate(&self, value: &str) {
        self.payload.lock().value = value.to_string();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SecretSource for StaticSecretSource {
    async fn get_secret_string(&self, _secret_id: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.payload.lock().to_secret_string())
    }
}

/// Fails every fetch
#[derive(Debug, Default)]
pub struct FailingSecretSource {
    calls: AtomicUsize,
}

impl FailingSecretSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SecretSource for FailingSecretSource {
    async fn get_secret_string(&self, secret_id: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        bail!("secret {secret_id} is unavailable")
    }
}
