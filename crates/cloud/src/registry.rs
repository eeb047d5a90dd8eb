//! Provider clients keyed by credential fingerprint.
//!
//! Two deployments with different credentials never share a client, and two
//! deployments with the same credentials reuse one.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};

/// SHA-256 over a provider name and the parts identifying an account (key id,
/// region, project). Secrets enter only as their own digest, see
/// [`secret_digest`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CredentialFingerprint(String);

impl CredentialFingerprint {
    pub fn new(provider: &str, parts: &[&str]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(provider.as_bytes());
        for part in parts {
            // Separator keeps ("ab", "c") and ("a", "bc") distinct.
            hasher.update([0u8]);
            hasher.update(part.as_bytes());
        }
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CredentialFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short form is enough to correlate log lines.
        f.write_str(&self.0[..12.min(self.0.len())])
    }
}

/// Hex SHA-256 of a secret, so a rotated secret changes the fingerprint
/// without the secret itself being hashed alongside the other parts.
pub fn secret_digest(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

type Slot<C> = Arc<OnceCell<Arc<C>>>;

/// Lazily-built clients, one per credential fingerprint.
pub struct ClientRegistry<C> {
    clients: Mutex<HashMap<CredentialFingerprint, Slot<C>>>,
}

impl<C> Default for ClientRegistry<C> {
    fn default() -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
        }
    }
}

impl<C> ClientRegistry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the client for `fingerprint`, building it with `init` on first use.
    ///
    /// Concurrent callers with the same credentials build the client once.
    /// Callers with different credentials never wait on each other.
    pub async fn get_or_try_init<F, Fut, E>(
        &self,
        fingerprint: &CredentialFingerprint,
        init: F,
    ) -> Result<Arc<C>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<C, E>>,
    {
        let slot = {
            let mut clients = self.clients.lock().await;
            Arc::clone(clients.entry(fingerprint.clone()).or_default())
        };
        let client = slot
            .get_or_try_init(|| async {
                let client = Arc::new(init().await?);
                tracing::debug!(fingerprint = %fingerprint, "Built provider client");
                Ok(client)
            })
            .await?;
        Ok(Arc::clone(client))
    }

    /// Number of clients built so far.
    pub async fn len(&self) -> usize {
        self.clients
            .lock()
            .await
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
