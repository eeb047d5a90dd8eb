//! Pinner trait and the directory upload shared by every pinner.

use crate::error::{IpfsError, IpfsResult};
use async_trait::async_trait;
use dshop_core::fs::{guess_content_type, walk_dir};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;

/// Root directory name used when the directory has no name of its own.
const DEFAULT_ROOT: &str = "public";

/// One file of a directory upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    /// Path relative to the directory root, `/`-separated.
    pub key: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// A directory read into memory for pinning.
#[derive(Debug, Clone)]
pub struct DirectoryUpload {
    /// Name of the wrapping directory in the added tree.
    pub root: String,
    pub files: Vec<UploadFile>,
}

impl DirectoryUpload {
    /// Read every file under `dir`.
    pub async fn read(dir: &Path) -> IpfsResult<Self> {
        let root = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| DEFAULT_ROOT.to_string());
        let mut files = Vec::new();
        for walked in walk_dir(dir).await? {
            files.push(UploadFile {
                content_type: guess_content_type(&walked.key),
                data: tokio::fs::read(&walked.path).await?,
                key: walked.key,
            });
        }
        Ok(Self { root, files })
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|f| f.key.as_str())
    }

    /// Every directory of the tree, parents before children, root first.
    fn directories(&self) -> Vec<String> {
        let mut directories = BTreeSet::new();
        directories.insert(self.root.clone());
        for file in &self.files {
            let mut prefix = self.root.clone();
            let segments: Vec<&str> = file.key.split('/').collect();
            for segment in &segments[..segments.len().saturating_sub(1)] {
                prefix = format!("{prefix}/{segment}");
                directories.insert(prefix.clone());
            }
        }
        directories.into_iter().collect()
    }

    /// Multipart form in the layout the IPFS `add` endpoints expect.
    ///
    /// With `directory_parts`, every directory is sent as an
    /// `application/x-directory` part ahead of its files.
    pub fn form(&self, field: &str, directory_parts: bool) -> IpfsResult<Form> {
        let mut form = Form::new();
        if directory_parts {
            for directory in self.directories() {
                let part = Part::bytes(Vec::new())
                    .file_name(directory)
                    .mime_str("application/x-directory")?;
                form = form.part(field.to_string(), part);
            }
        }
        for file in &self.files {
            let part = Part::bytes(file.data.clone())
                .file_name(format!("{}/{}", self.root, file.key))
                .mime_str(&file.content_type)?;
            form = form.part(field.to_string(), part);
        }
        Ok(form)
    }
}

/// A line of an IPFS `add` response.
///
/// Kubo reports `Name`/`Hash`; IPFS Cluster reports `name`/`cid`, with the
/// CID either a plain string or a `{"/": "..."}` link.
#[derive(Debug, Deserialize)]
pub(crate) struct AddedEntry {
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(alias = "Hash", alias = "cid")]
    pub hash: Cid,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum Cid {
    Plain(String),
    Link {
        #[serde(rename = "/")]
        link: String,
    },
}

impl Cid {
    fn into_string(self) -> String {
        match self {
            Self::Plain(cid) | Self::Link { link: cid } => cid,
        }
    }
}

/// Root hash from an `add` response body: the entry named after the root
/// directory, or the last entry.
///
/// Accepts newline-delimited JSON or a JSON array.
pub(crate) fn root_hash(pinner: &str, body: &str, root: &str) -> IpfsResult<String> {
    let invalid = |e: serde_json::Error| IpfsError::InvalidResponse {
        pinner: pinner.to_string(),
        message: e.to_string(),
    };
    let trimmed = body.trim();
    let entries: Vec<AddedEntry> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed).map_err(invalid)?
    } else {
        trimmed
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(serde_json::from_str)
            .collect::<Result<_, _>>()
            .map_err(invalid)?
    };
    let root_entry = entries
        .iter()
        .position(|e| e.name == root)
        .or_else(|| entries.len().checked_sub(1));
    root_entry
        .and_then(|index| entries.into_iter().nth(index))
        .map(|e| e.hash.into_string())
        .filter(|hash| !hash.is_empty())
        .ok_or_else(|| IpfsError::MissingHash {
            pinner: pinner.to_string(),
        })
}

/// A pinning service a build directory is published to.
#[async_trait]
pub trait Pinner: Send + Sync {
    fn name(&self) -> &'static str;

    /// How the pinner is recorded on the deployment (`ipfsPinner`).
    fn identity(&self) -> String;

    /// Add and pin the directory, returning its root CID.
    async fn add_directory(&self, upload: &DirectoryUpload) -> IpfsResult<String>;
}

/// Turn a non-success response into `IpfsError::Status`.
pub(crate) async fn check_status(
    pinner: &str,
    response: reqwest::Response,
) -> IpfsResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(IpfsError::Status {
        pinner: pinner.to_string(),
        status: status.as_u16(),
        message,
    })
}
