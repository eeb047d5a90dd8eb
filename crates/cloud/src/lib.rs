//! Provider client plumbing for the Dshop deployment pipeline.
//!
//! Clients are never module-level singletons: each is built on first use for
//! a given credential set and cached in a [`ClientRegistry`] keyed by a
//! fingerprint of the credential parts (secrets only as their digest).

pub mod aws;
pub mod error;
pub mod gcp;
pub mod registry;

pub use aws::{AwsClients, AwsCredentials, AwsRegistry, aws_clients};
pub use error::{CloudError, CloudResult};
pub use gcp::{GcpClient, GcpEndpoints, GcpRegistry, Operation, gcp_client};
pub use registry::{ClientRegistry, CredentialFingerprint, secret_digest};

use std::sync::Arc;

/// Registries for every provider family, shared by all deployments.
#[derive(Default)]
pub struct CloudClients {
    pub aws: Arc<AwsRegistry>,
    pub gcp: Arc<GcpRegistry>,
}

impl CloudClients {
    pub fn new() -> Self {
        Self::default()
    }
}
