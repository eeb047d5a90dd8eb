//! Build assembler: theme copy, data directory copy and HTML placeholders.
//!
//! Every build starts from an empty `public/`: the theme (or the default
//! storefront build) is copied in, the shop's data directory is copied under
//! `public/{authToken}`, and the placeholders in the HTML entry points are
//! replaced with values from the shop's `config.json`.

use crate::error::{DeployError, DeployResult};
use dshop_core::config::AppConfig;
use dshop_core::fs::{copy_dir_recursive, remove_dir_if_exists};
use dshop_core::{Network, ShopConfig, ShopPaths};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// HTML entry points rewritten after the copy.
pub const ENTRY_POINTS: [&str; 2] = ["index.html", "cdn.html"];

const DEFAULT_FAVICON: &str = "favicon.ico";

/// Result of one assembly.
#[derive(Debug, Clone)]
pub struct AssembledBuild {
    pub public_dir: PathBuf,
    pub config: ShopConfig,
    /// Files copied into `public/`, theme and data together.
    pub files: u64,
}

/// Assembles a shop's storefront into `{OutputDir}/public`.
#[derive(Debug, Clone)]
pub struct BuildAssembler {
    themes_dir: PathBuf,
    dist_dir: PathBuf,
    ui_cdn: Option<String>,
}

impl BuildAssembler {
    pub fn new(themes_dir: impl Into<PathBuf>, dist_dir: impl Into<PathBuf>) -> Self {
        Self {
            themes_dir: themes_dir.into(),
            dist_dir: dist_dir.into(),
            ui_cdn: None,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            ui_cdn: config.deploy.ui_cdn.clone(),
            ..Self::new(&config.paths.themes_dir, &config.paths.dist_dir)
        }
    }

    /// Origin substituted for `%UI_SRC%`.
    pub fn with_ui_cdn(mut self, ui_cdn: Option<String>) -> Self {
        self.ui_cdn = ui_cdn;
        self
    }

    /// Source directory for the storefront: the theme's directory, or the
    /// default build when the shop has no theme.
    pub fn source_dir(&self, config: &ShopConfig) -> DeployResult<PathBuf> {
        match config.theme_id.as_deref().filter(|id| !id.is_empty()) {
            Some(theme_id) => {
                if !is_plain_name(theme_id) {
                    return Err(DeployError::Config(format!("invalid theme id: {theme_id}")));
                }
                Ok(self.themes_dir.join(theme_id))
            }
            None => Ok(self.dist_dir.clone()),
        }
    }

    /// Assemble the build for `network` into `paths.public_dir()`.
    ///
    /// Fails if `config.json` is missing or malformed, does not mention the
    /// network, or the theme directory does not exist.
    #[instrument(skip_all, fields(network_id = network.network_id, data_dir = paths.data_dir_name()))]
    pub async fn assemble(&self, network: &Network, paths: &ShopPaths) -> DeployResult<AssembledBuild> {
        let public_dir = paths.public_dir();
        remove_dir_if_exists(&public_dir).await?;

        let config = ShopConfig::load(&paths.config_path()).await?;
        config.ensure_network(network.network_id)?;

        let source = self.source_dir(&config)?;
        debug!(source = %source.display(), "Copying storefront");
        let mut files = copy_dir_recursive(&source, &public_dir).await?;
        files += copy_dir_recursive(paths.data_dir(), public_dir.join(paths.data_dir_name())).await?;

        let placeholders = Placeholders::new(&config, network, paths.data_dir_name(), self.ui_cdn.as_deref());
        for entry in ENTRY_POINTS {
            rewrite_entry_point(&public_dir.join(entry), &placeholders).await?;
        }

        info!(files, public_dir = %public_dir.display(), "Assembled build");
        Ok(AssembledBuild {
            public_dir,
            config,
            files,
        })
    }
}

/// A single path segment with no separators or parent references.
fn is_plain_name(name: &str) -> bool {
    !name.contains(['/', '\\']) && name != "." && name != ".."
}

/// Values substituted into the HTML entry points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholders {
    title: String,
    meta_description: String,
    data_dir: String,
    network: String,
    favicon: String,
    ui_src: String,
}

impl Placeholders {
    pub fn new(config: &ShopConfig, network: &Network, data_dir: &str, ui_cdn: Option<&str>) -> Self {
        let favicon = match config.favicon.as_deref().filter(|f| !f.is_empty()) {
            Some(favicon) => format!("{data_dir}/{}", favicon.trim_start_matches('/')),
            None => DEFAULT_FAVICON.to_string(),
        };
        Self {
            title: escape_html(config.display_title()),
            meta_description: escape_html(config.meta_description.as_deref().unwrap_or_default()),
            data_dir: data_dir.to_string(),
            network: network.name.clone(),
            favicon: escape_html(&favicon),
            ui_src: ui_cdn.unwrap_or_default().trim_end_matches('/').to_string(),
        }
    }

    /// Replace every `%NAME%` token in `html`.
    pub fn apply(&self, html: &str) -> String {
        [
            ("%TITLE%", &self.title),
            ("%META_DESC%", &self.meta_description),
            ("%DATA_DIR%", &self.data_dir),
            ("%NETWORK%", &self.network),
            ("%FAVICON%", &self.favicon),
            ("%UI_SRC%", &self.ui_src),
        ]
        .into_iter()
        .fold(html.to_string(), |html, (token, value)| html.replace(token, value))
    }
}

async fn rewrite_entry_point(path: &Path, placeholders: &Placeholders) -> DeployResult<()> {
    let html = match tokio::fs::read_to_string(path).await {
        Ok(html) => html,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Entry point not present");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    tokio::fs::write(path, placeholders.apply(&html)).await?;
    Ok(())
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use dshop_core::NetworkConfig;

    fn network() -> Network {
        Network {
            network_id: 1,
            name: "mainnet".to_string(),
            ipfs_gateway: None,
            ipfs_api: None,
            config: NetworkConfig::default(),
        }
    }

    #[test]
    fn test_placeholders_applied() {
        let config = ShopConfig {
            full_title: Some("Tom & Jerry's".to_string()),
            meta_description: Some("Cheese <cheap>".to_string()),
            favicon: Some("/favicon.png".to_string()),
            ..Default::default()
        };
        let placeholders = Placeholders::new(&config, &network(), "tok", Some("https://ui.ogn.app/"));
        let html = placeholders.apply(
            "<title>%TITLE%</title><meta content=\"%META_DESC%\">\
             <link href=\"%FAVICON%\"><script src=\"%UI_SRC%/app.js\"></script>\
             <body data-dir=\"%DATA_DIR%\" data-network=\"%NETWORK%\">",
        );
        assert_eq!(
            html,
            "<title>Tom &amp; Jerry&#39;s</title><meta content=\"Cheese &lt;cheap&gt;\">\
             <link href=\"tok/favicon.png\"><script src=\"https://ui.ogn.app/app.js\"></script>\
             <body data-dir=\"tok\" data-network=\"mainnet\">"
        );
    }

    #[test]
    fn test_placeholder_defaults() {
        let placeholders = Placeholders::new(&ShopConfig::default(), &network(), "tok", None);
        assert_eq!(
            placeholders.apply("%TITLE%|%META_DESC%|%FAVICON%|%UI_SRC%"),
            "||favicon.ico|"
        );
    }

    #[test]
    fn test_source_dir() {
        let assembler = BuildAssembler::new("/themes", "/dist");
        let themed = ShopConfig {
            theme_id: Some("fashion".to_string()),
            ..Default::default()
        };
        assert_eq!(
            assembler.source_dir(&themed).unwrap(),
            PathBuf::from("/themes/fashion")
        );
        assert_eq!(
            assembler.source_dir(&ShopConfig::default()).unwrap(),
            PathBuf::from("/dist")
        );
        let escaping = ShopConfig {
            theme_id: Some("../etc".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            assembler.source_dir(&escaping),
            Err(DeployError::Config(_))
        ));
    }
}
