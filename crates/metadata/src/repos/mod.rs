//! Repository traits for metadata operations.

pub mod deployment_names;
pub mod deployments;
pub mod networks;
pub mod shops;

pub use deployment_names::DeploymentNameRepo;
pub use deployments::DeploymentRepo;
pub use networks::NetworkRepo;
pub use shops::ShopRepo;
