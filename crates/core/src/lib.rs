//! Core domain types and shared logic for the Dshop deployment pipeline.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Application configuration
//! - Per-network provider credentials and resource selection tags
//! - Shop `config.json` and on-disk layout
//! - Deployment status, wire formats and stable error codes
//! - Provider resource naming (bucket names, incremental generations)
//! - Filesystem helpers shared by every uploader

pub mod config;
pub mod deployment;
pub mod error;
pub mod fs;
pub mod naming;
pub mod network;
pub mod resource;
pub mod shop;

pub use deployment::{
    BucketDeployment, CdnConfiguration, DeployOutcome, DeploymentStatus, ErrorCode,
};
pub use error::{Error, Result};
pub use naming::{
    IncrementalName, increment_name, incremental_name_match, normalize_aws_bucket_name,
    normalize_gcp_bucket_name,
};
pub use network::{Network, NetworkConfig};
pub use resource::{ResourceSelection, ResourceTag};
pub use shop::{Shop, ShopConfig, ShopPaths};

/// Prefix shared by every bucket and CDN resource name the pipeline creates.
pub const RESOURCE_PREFIX: &str = "dshop";
