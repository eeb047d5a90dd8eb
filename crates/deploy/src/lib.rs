//! The Dshop deploy pipeline.
//!
//! A deploy job runs strictly in sequence:
//! lock, build, bucket upload, IPFS publication, DNS, then the success record.
//! Any stage failure is recorded on the deployment row and mapped to a stable
//! error code; callers never see a raw error from [`Deployer::deploy`].

pub mod autossl;
pub mod build;
pub mod cdn;
pub mod error;
pub mod job;
pub mod pipeline;
pub mod records;

pub use autossl::prime_autossl;
pub use build::{AssembledBuild, BuildAssembler};
pub use cdn::CdnJob;
pub use error::{DeployError, DeployResult, Stage};
pub use job::DeployJob;
pub use pipeline::Deployer;
pub use records::DeploymentRecords;
