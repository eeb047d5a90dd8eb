//! Pinner implementations.

pub mod cluster;
pub mod local;
pub mod pinata;

pub use cluster::ClusterPinner;
pub use local::LocalNodePinner;
pub use pinata::PinataPinner;
