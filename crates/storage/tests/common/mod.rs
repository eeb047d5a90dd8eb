pub mod mocks;

#[allow(unused_imports)]
pub use mocks::{MemoryBucketClient, StaticProvider, sample_site, test_network, test_shop};
