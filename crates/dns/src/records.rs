//! Provider-neutral record model and the change planner.
//!
//! Every provider follows the same shape: read what exists at the subdomain
//! and its `_dnslink` name, then apply the minimal set of deletes and upserts
//! that brings both names to the desired state. Planning is pure so that the
//! idempotency rules live in one place.

use crate::error::{DnsError, DnsResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// TTL for every record the pipeline writes.
pub const DEFAULT_TTL: u32 = 300;

/// What the subdomain should point at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DnsTarget {
    /// A hostname, e.g. the IPFS gateway or a CDN domain.
    Cname(String),
    /// Explicit addresses, e.g. a GCP global forwarding address.
    Addresses(Vec<String>),
}

/// One `set_records` call.
#[derive(Debug, Clone)]
pub struct DnsRequest {
    /// Zone apex, e.g. `ogn.app`.
    pub zone: String,
    /// Label under the zone, e.g. `myshop`.
    pub subdomain: String,
    pub target: DnsTarget,
    /// IPFS hash for the `_dnslink` TXT record, if any.
    pub hash: Option<String>,
}

impl DnsRequest {
    /// Build a request, preferring explicit addresses over a CNAME target.
    pub fn new(
        zone: impl Into<String>,
        subdomain: impl Into<String>,
        cname: Option<String>,
        ip_addresses: Vec<String>,
        hash: Option<String>,
    ) -> DnsResult<Self> {
        let target = if !ip_addresses.is_empty() {
            DnsTarget::Addresses(ip_addresses)
        } else {
            match cname.filter(|c| !c.trim().is_empty()) {
                Some(cname) => DnsTarget::Cname(cname),
                None => return Err(DnsError::MissingTarget),
            }
        };
        Ok(Self {
            zone: trim_dot(&zone.into()).to_string(),
            subdomain: trim_dot(&subdomain.into()).to_string(),
            target,
            hash,
        })
    }

    /// `subdomain.zone`, without a trailing dot.
    pub fn fqdn(&self) -> String {
        format!("{}.{}", self.subdomain, self.zone)
    }

    /// `_dnslink.subdomain.zone`
    pub fn dnslink_name(&self) -> String {
        format!("_dnslink.{}", self.fqdn())
    }

    /// `dnslink=/ipfs/<hash>`
    pub fn dnslink_value(&self) -> Option<String> {
        self.hash.as_ref().map(|hash| format!("dnslink=/ipfs/{hash}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    A,
    Cname,
    Txt,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::Cname => "CNAME",
            Self::Txt => "TXT",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "A" => Some(Self::A),
            "CNAME" => Some(Self::Cname),
            "TXT" => Some(Self::Txt),
            _ => None,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All values of one type at one name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSet {
    pub name: String,
    pub record_type: RecordType,
    pub ttl: u32,
    pub values: Vec<String>,
}

impl RecordSet {
    fn matches(&self, name: &str, record_type: RecordType) -> bool {
        self.record_type == record_type && same_name(&self.name, name)
    }

    fn same_values(&self, other: &RecordSet) -> bool {
        // TXT payloads carry case-sensitive hashes; hostnames do not.
        let txt = self.record_type == RecordType::Txt;
        let normalize = |values: &[String]| {
            let mut v: Vec<String> = values
                .iter()
                .map(|value| {
                    if txt {
                        value.trim_matches('"').to_string()
                    } else {
                        trim_dot(value).to_ascii_lowercase()
                    }
                })
                .collect();
            v.sort();
            v
        };
        normalize(&self.values) == normalize(&other.values)
    }
}

/// How a provider spells names and TXT values.
#[derive(Debug, Clone, Copy)]
pub struct RecordFormat {
    /// Names and CNAME targets end in `.` (Route53, Cloud DNS).
    pub trailing_dot: bool,
    /// TXT values are wrapped in double quotes (Route53, Cloud DNS).
    pub quote_txt: bool,
}

impl RecordFormat {
    pub const PLAIN: Self = Self {
        trailing_dot: false,
        quote_txt: false,
    };

    pub const ZONE_FILE: Self = Self {
        trailing_dot: true,
        quote_txt: true,
    };

    pub fn name(&self, name: &str) -> String {
        let name = trim_dot(name);
        if self.trailing_dot {
            format!("{name}.")
        } else {
            name.to_string()
        }
    }

    fn txt(&self, value: &str) -> String {
        if self.quote_txt {
            format!("\"{value}\"")
        } else {
            value.to_string()
        }
    }
}

/// One step of a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedChange {
    /// Remove a conflicting record set.
    Delete(RecordSet),
    /// Create `desired`, or replace `existing` with it.
    Upsert {
        existing: Option<RecordSet>,
        desired: RecordSet,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Create,
    Update,
    Delete,
}

/// Summary of one applied change, returned to callers for logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DnsChange {
    pub action: ChangeAction,
    pub record_type: RecordType,
    pub name: String,
}

impl From<&PlannedChange> for DnsChange {
    fn from(change: &PlannedChange) -> Self {
        match change {
            PlannedChange::Delete(set) => Self {
                action: ChangeAction::Delete,
                record_type: set.record_type,
                name: trim_dot(&set.name).to_string(),
            },
            PlannedChange::Upsert { existing, desired } => Self {
                action: if existing.is_some() {
                    ChangeAction::Update
                } else {
                    ChangeAction::Create
                },
                record_type: desired.record_type,
                name: trim_dot(&desired.name).to_string(),
            },
        }
    }
}

/// The record sets a request wants to exist.
pub fn desired_records(request: &DnsRequest, format: RecordFormat) -> Vec<RecordSet> {
    let fqdn = format.name(&request.fqdn());
    let mut desired = vec![match &request.target {
        DnsTarget::Cname(target) => RecordSet {
            name: fqdn,
            record_type: RecordType::Cname,
            ttl: DEFAULT_TTL,
            values: vec![format.name(target)],
        },
        DnsTarget::Addresses(addresses) => RecordSet {
            name: fqdn,
            record_type: RecordType::A,
            ttl: DEFAULT_TTL,
            values: addresses.clone(),
        },
    }];
    if let Some(value) = request.dnslink_value() {
        desired.push(RecordSet {
            name: format.name(&request.dnslink_name()),
            record_type: RecordType::Txt,
            ttl: DEFAULT_TTL,
            values: vec![format.txt(&value)],
        });
    }
    desired
}

/// Plan the changes that bring `existing` to the requested state.
///
/// A name can carry either A or CNAME, never both, so the opposite type is
/// deleted first. Record sets that already match are left alone, which makes
/// a repeated call a no-op.
pub fn plan_changes(
    request: &DnsRequest,
    existing: &[RecordSet],
    format: RecordFormat,
) -> Vec<PlannedChange> {
    let fqdn = request.fqdn();
    let conflicting = match request.target {
        DnsTarget::Cname(_) => RecordType::A,
        DnsTarget::Addresses(_) => RecordType::Cname,
    };

    let mut changes: Vec<PlannedChange> = existing
        .iter()
        .filter(|set| set.matches(&fqdn, conflicting))
        .cloned()
        .map(PlannedChange::Delete)
        .collect();

    for desired in desired_records(request, format) {
        let current = existing
            .iter()
            .find(|set| set.matches(&desired.name, desired.record_type));
        match current {
            Some(current) if current.same_values(&desired) => {}
            current => changes.push(PlannedChange::Upsert {
                existing: current.cloned(),
                desired,
            }),
        }
    }
    changes
}

pub(crate) fn trim_dot(name: &str) -> &str {
    name.trim_end_matches('.')
}

pub(crate) fn same_name(a: &str, b: &str) -> bool {
    trim_dot(a).eq_ignore_ascii_case(trim_dot(b))
}
