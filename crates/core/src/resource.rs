//! Caller-selected provider tags.
//!
//! A deploy job carries a list of tags such as `aws-files` or `cloudflare-dns`.
//! A provider only runs when its tag is selected and its credentials are present.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Known provider tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceTag {
    AwsFiles,
    GcpFiles,
    AwsCdn,
    GcpCdn,
    CloudflareDns,
    GcpDns,
    AwsDns,
    IpfsCluster,
    IpfsPinata,
}

impl ResourceTag {
    pub const ALL: [ResourceTag; 9] = [
        Self::AwsFiles,
        Self::GcpFiles,
        Self::AwsCdn,
        Self::GcpCdn,
        Self::CloudflareDns,
        Self::GcpDns,
        Self::AwsDns,
        Self::IpfsCluster,
        Self::IpfsPinata,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AwsFiles => "aws-files",
            Self::GcpFiles => "gcp-files",
            Self::AwsCdn => "aws-cdn",
            Self::GcpCdn => "gcp-cdn",
            Self::CloudflareDns => "cloudflare-dns",
            Self::GcpDns => "gcp-dns",
            Self::AwsDns => "aws-dns",
            Self::IpfsCluster => "ipfs-cluster",
            Self::IpfsPinata => "ipfs-pinata",
        }
    }

    pub fn is_dns(&self) -> bool {
        matches!(self, Self::CloudflareDns | Self::GcpDns | Self::AwsDns)
    }
}

impl fmt::Display for ResourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| Error::UnknownResourceTag(s.to_string()))
    }
}

/// The set of tags selected for one job.
///
/// Unknown tags are kept so they can be reported, but never match a provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct ResourceSelection {
    tags: Vec<ResourceTag>,
    unknown: Vec<String>,
}

impl ResourceSelection {
    pub fn new(tags: impl IntoIterator<Item = ResourceTag>) -> Self {
        let mut selection = Self::default();
        for tag in tags {
            if !selection.tags.contains(&tag) {
                selection.tags.push(tag);
            }
        }
        selection
    }

    pub fn contains(&self, tag: ResourceTag) -> bool {
        self.tags.contains(&tag)
    }

    pub fn tags(&self) -> &[ResourceTag] {
        &self.tags
    }

    pub fn unknown(&self) -> &[String] {
        &self.unknown
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// The first selected DNS provider tag, in selection order.
    pub fn dns_provider(&self) -> Option<ResourceTag> {
        self.tags.iter().copied().find(ResourceTag::is_dns)
    }
}

impl From<Vec<String>> for ResourceSelection {
    fn from(raw: Vec<String>) -> Self {
        let mut selection = Self::default();
        for value in raw {
            match value.parse::<ResourceTag>() {
                Ok(tag) if !selection.tags.contains(&tag) => selection.tags.push(tag),
                Ok(_) => {}
                Err(_) => {
                    warn!(tag = %value, "Ignoring unknown resource selection tag");
                    selection.unknown.push(value);
                }
            }
        }
        selection
    }
}

impl From<ResourceSelection> for Vec<String> {
    fn from(selection: ResourceSelection) -> Self {
        selection
            .tags
            .iter()
            .map(|t| t.as_str().to_string())
            .chain(selection.unknown)
            .collect()
    }
}

impl FromIterator<ResourceTag> for ResourceSelection {
    fn from_iter<I: IntoIterator<Item = ResourceTag>>(iter: I) -> Self {
        Self::new(iter)
    }
}
