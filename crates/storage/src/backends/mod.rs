//! Bucket provider implementations.

pub mod gcs;
pub mod s3;
