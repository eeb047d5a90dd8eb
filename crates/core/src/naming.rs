//! Deterministic provider resource naming.
//!
//! Bucket names must satisfy each provider's naming rules and be stable
//! across deploys so repeat deployments find and reuse the same bucket.
//! Resources that cannot be updated in place (GCP managed certificates,
//! HTTPS proxies) are modelled as a generation chain: `name`, `name-1`,
//! `name-2`, and so on.

use std::cmp::Ordering;

const MIN_BUCKET_LEN: usize = 3;
const MAX_BUCKET_LEN: usize = 63;

/// Normalize a candidate bucket name to AWS S3 naming rules.
///
/// The result is lowercase `[a-z0-9.-]`, 3 to 63 characters, starts and ends
/// with an alphanumeric, never starts with `xn--` and never looks like an IPv4
/// address. Normalizing an already normalized name returns it unchanged.
pub fn normalize_aws_bucket_name(name: &str) -> String {
    let mapped: String = name
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '.' | '-' => c,
            _ => '-',
        })
        .collect();

    let mut normalized = collapse_separators(&mapped, &['.', '-']);
    loop {
        let trimmed = normalized.trim_matches(['.', '-']);
        let stripped = trimmed.strip_prefix("xn--").unwrap_or(trimmed);
        if stripped == normalized {
            break;
        }
        normalized = stripped.to_string();
    }

    let mut normalized = finish_length(normalized, &['.', '-']);
    if looks_like_ipv4(&normalized) {
        normalized = normalized.replace('.', "-");
    }
    normalized
}

/// Normalize a candidate bucket name to Google Cloud Storage naming rules.
///
/// Like the AWS rules but `_` is allowed, names may not start with `goog`
/// and may not contain `google` (rewritten to `g00gle`).
pub fn normalize_gcp_bucket_name(name: &str) -> String {
    let mapped: String = name
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '.' | '-' | '_' => c,
            _ => '-',
        })
        .collect();

    let mapped = mapped.replace("google", "g00gle");
    let collapsed = collapse_separators(&mapped, &['.', '-', '_']);
    let mut normalized = collapsed.trim_matches(['.', '-', '_']).to_string();
    if let Some(rest) = normalized.strip_prefix("goog") {
        normalized = format!("g00g{rest}");
    }

    let normalized = finish_length(normalized, &['.', '-', '_']);
    if looks_like_ipv4(&normalized) {
        normalized.replace('.', "-")
    } else {
        normalized
    }
}

/// Replace every run of two or more separators with a single `-`.
fn collapse_separators(input: &str, separators: &[char]) -> String {
    let mut out = String::with_capacity(input.len());
    let mut run = String::new();
    for c in input.chars() {
        if separators.contains(&c) {
            run.push(c);
            continue;
        }
        flush_run(&mut out, &mut run);
        out.push(c);
    }
    flush_run(&mut out, &mut run);
    out
}

fn flush_run(out: &mut String, run: &mut String) {
    match run.chars().count() {
        0 => {}
        1 => out.push_str(run),
        _ => out.push('-'),
    }
    run.clear();
}

/// Truncate to the maximum length, re-trim, and pad short names with `0`.
fn finish_length(mut name: String, separators: &[char]) -> String {
    if name.len() > MAX_BUCKET_LEN {
        name.truncate(MAX_BUCKET_LEN);
        name = name.trim_end_matches(separators).to_string();
    }
    while name.len() < MIN_BUCKET_LEN {
        name.push('0');
    }
    name
}

fn looks_like_ipv4(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() == 4
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.len() <= 3 && p.chars().all(|c| c.is_ascii_digit()))
}

/// One member of a generation chain (`base`, `base-1`, `base-2`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncrementalName {
    base: String,
    generation: u32,
}

impl IncrementalName {
    /// Generation 0 of a chain.
    pub fn first(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            generation: 0,
        }
    }

    /// Parse `name` as a member of the chain rooted at `base`.
    ///
    /// `base` is generation 0 and `base-N` (digits only) is generation N.
    pub fn parse(base: &str, name: &str) -> Option<Self> {
        if name == base {
            return Some(Self::first(base));
        }
        let suffix = name.strip_prefix(base)?.strip_prefix('-')?;
        if suffix.is_empty() || !suffix.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let generation = suffix.parse().ok()?;
        Some(Self {
            base: base.to_string(),
            generation,
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// The following generation.
    pub fn next(&self) -> Self {
        Self {
            base: self.base.clone(),
            generation: self.generation.saturating_add(1),
        }
    }

    /// Rendered resource name.
    pub fn name(&self) -> String {
        if self.generation == 0 {
            self.base.clone()
        } else {
            format!("{}-{}", self.base, self.generation)
        }
    }

    /// Chain members found in `names`, newest generation first.
    pub fn chain<'a>(base: &str, names: impl IntoIterator<Item = &'a str>) -> Vec<Self> {
        let mut chain: Vec<Self> = names
            .into_iter()
            .filter_map(|name| Self::parse(base, name))
            .collect();
        chain.sort_by(|a, b| b.cmp(a));
        chain.dedup();
        chain
    }

    /// Name of the generation after the newest one in `names`, or `base`
    /// itself when the chain is empty.
    pub fn next_in_chain<'a>(base: &str, names: impl IntoIterator<Item = &'a str>) -> Self {
        Self::chain(base, names)
            .first()
            .map(Self::next)
            .unwrap_or_else(|| Self::first(base))
    }

    /// Members to delete so that only the `keep` newest generations remain.
    pub fn prunable<'a>(
        base: &str,
        names: impl IntoIterator<Item = &'a str>,
        keep: usize,
    ) -> Vec<Self> {
        Self::chain(base, names).into_iter().skip(keep).collect()
    }
}

impl PartialOrd for IncrementalName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IncrementalName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.base
            .cmp(&other.base)
            .then(self.generation.cmp(&other.generation))
    }
}

impl std::fmt::Display for IncrementalName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name())
    }
}

/// Whether `name` belongs to the chain rooted at `base`.
pub fn incremental_name_match(base: &str, name: &str) -> bool {
    IncrementalName::parse(base, name).is_some()
}

/// Next name after `name` in the chain rooted at `base`.
///
/// A name outside the chain restarts it at generation 1.
pub fn increment_name(name: &str, base: &str) -> String {
    IncrementalName::parse(base, name)
        .unwrap_or_else(|| IncrementalName::first(base))
        .next()
        .name()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_valid_aws(name: &str) -> bool {
        (MIN_BUCKET_LEN..=MAX_BUCKET_LEN).contains(&name.len())
            && name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-')
            && !name.starts_with("xn--")
            && !name.starts_with(['.', '-'])
            && !name.ends_with(['.', '-'])
    }

    const SAMPLES: &[&str] = &[
        "dshop-mainnet-abc123",
        "DShop_Mainnet_ABC",
        "xn--dshop",
        "xn---xn--abc",
        "..--..",
        "",
        "a",
        "192.168.1.1",
        "shop..name--with.-runs",
        "dshop-localhost-a-very-long-auth-token-that-goes-beyond-the-sixty-three-character-limit",
        "ünïcödé shop name!",
        "my.google.bucket",
        "goog-shop",
    ];

    #[test]
    fn test_aws_normalization_is_valid_and_idempotent() {
        for sample in SAMPLES {
            let once = normalize_aws_bucket_name(sample);
            assert!(is_valid_aws(&once), "{sample:?} -> {once:?}");
            assert_eq!(normalize_aws_bucket_name(&once), once, "{sample:?}");
        }
    }

    #[test]
    fn test_gcp_normalization_is_idempotent() {
        for sample in SAMPLES {
            let once = normalize_gcp_bucket_name(sample);
            assert!((MIN_BUCKET_LEN..=MAX_BUCKET_LEN).contains(&once.len()));
            assert!(!once.starts_with("goog"), "{sample:?} -> {once:?}");
            assert!(!once.contains("google"), "{sample:?} -> {once:?}");
            assert_eq!(normalize_gcp_bucket_name(&once), once, "{sample:?}");
        }
    }

    #[test]
    fn test_aws_normalization_examples() {
        assert_eq!(
            normalize_aws_bucket_name("dshop-mainnet-ABC123"),
            "dshop-mainnet-abc123"
        );
        assert_eq!(normalize_aws_bucket_name("xn--shop"), "shop");
        assert_eq!(normalize_aws_bucket_name("a"), "a00");
        assert_eq!(normalize_aws_bucket_name("10.0.0.1"), "10-0-0-1");
        assert_eq!(normalize_aws_bucket_name("a..b"), "a-b");
    }

    #[test]
    fn test_gcp_keeps_underscore() {
        assert_eq!(normalize_gcp_bucket_name("dshop_main"), "dshop_main");
        assert_eq!(normalize_gcp_bucket_name("Google-Shop"), "g00gle-shop");
    }

    #[test]
    fn test_increment_name() {
        assert_eq!(increment_name("svc-3", "svc"), "svc-4");
        assert_eq!(increment_name("svc", "svc"), "svc-1");
        assert_eq!(increment_name("other", "svc"), "svc-1");
    }

    #[test]
    fn test_incremental_name_match() {
        assert!(incremental_name_match("svc", "svc"));
        assert!(incremental_name_match("svc", "svc-12"));
        assert!(!incremental_name_match("svc", "svcx"));
        assert!(!incremental_name_match("svc", "svc-"));
        assert!(!incremental_name_match("svc", "svc-1a"));
    }

    #[test]
    fn test_chain_ordering_and_pruning() {
        let existing = ["svc", "svc-1", "svc-3", "unrelated"];
        let next = IncrementalName::next_in_chain("svc", existing);
        assert_eq!(next.name(), "svc-4");

        let pruned: Vec<String> = IncrementalName::prunable("svc", existing, 2)
            .iter()
            .map(IncrementalName::name)
            .collect();
        assert_eq!(pruned, vec!["svc".to_string()]);
    }

    #[test]
    fn test_empty_chain_starts_at_base() {
        let next = IncrementalName::next_in_chain("svc", std::iter::empty());
        assert_eq!(next.name(), "svc");
        assert_eq!(next.generation(), 0);
    }
}
