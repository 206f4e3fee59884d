//! Access to the remote repository.
//!
//! Everything the resolver and locator learn comes through [`Remote`], which
//! only knows how to fetch a URL as text. Directory listings and manifests
//! are parsed here on top of it.

use crate::error::QtdlError;
use crate::types::PackageRecord;
use anyhow::{Context, Result};
use regex::Regex;
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::OnceLock;

#[allow(async_fn_in_trait)]
pub trait Remote {
    async fn fetch_text(&self, url: &str) -> Result<String>;
}

pub struct HttpRemote {
    client: reqwest::Client,
}

impl HttpRemote {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Remote for HttpRemote {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        tracing::debug!("GET {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(QtdlError::NotFound {
                url: url.to_string(),
            }
            .into());
        }
        if !status.is_success() {
            return Err(QtdlError::RequestFailed {
                url: url.to_string(),
                status,
            }
            .into());
        }

        Ok(response.text().await?)
    }
}

pub fn user_agent() -> String {
    format!("qtdl/{}", env!("CARGO_PKG_VERSION"))
}

/// List sub-directories (names keep their trailing `/`).
pub async fn list_directories<R: Remote>(remote: &R, url: &str) -> Result<BTreeSet<String>> {
    let html = remote.fetch_text(url).await?;
    let dirs = parse_directory_listing(&html);
    tracing::debug!("{} directories under {}", dirs.len(), url);
    Ok(dirs)
}

/// Fetch and parse an `Updates.xml` manifest.
pub async fn read_manifest<R: Remote>(remote: &R, url: &str) -> Result<Vec<PackageRecord>> {
    let xml = remote.fetch_text(url).await?;
    parse_manifest(&xml).with_context(|| format!("Could not parse manifest at {}", url))
}

fn row_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<tr[^>]*>(.*?)</tr>").expect("static regex"))
}

fn cell_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<t[dh][^>]*>(.*?)</t[dh]>").expect("static regex"))
}

fn href_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)<a\s[^>]*?href\s*=\s*["']([^"']*)["']"#).expect("static regex")
    })
}

/// Extract sub-directory links from an HTML index table.
///
/// The first two rows are headers. The link lives in the second column;
/// absolute links point back up the tree and are skipped.
pub fn parse_directory_listing(html: &str) -> BTreeSet<String> {
    let mut dirs = BTreeSet::new();

    for row in row_re().captures_iter(html).skip(2) {
        let Some(cell) = cell_re().captures_iter(&row[1]).nth(1) else {
            continue;
        };
        let Some(link) = href_re().captures(&cell[1]) else {
            continue;
        };
        let target = link[1].trim();
        if target.starts_with('/') || !target.ends_with('/') {
            continue;
        }
        dirs.insert(target.to_string());
    }

    dirs
}

#[derive(Debug, Deserialize)]
struct UpdatesXml {
    #[serde(rename = "PackageUpdate", default)]
    packages: Vec<PackageUpdateXml>,
}

#[derive(Debug, Deserialize)]
struct PackageUpdateXml {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Version")]
    version: String,
    #[serde(rename = "DownloadableArchives", default)]
    downloadable_archives: Option<String>,
}

pub fn parse_manifest(xml: &str) -> Result<Vec<PackageRecord>> {
    let updates: UpdatesXml = quick_xml::de::from_str(xml)?;

    Ok(updates
        .packages
        .into_iter()
        .map(|package| PackageRecord {
            name: package.name.trim().to_string(),
            version: package.version.trim().to_string(),
            archives: package
                .downloadable_archives
                .unwrap_or_default()
                .split(", ")
                .map(str::trim)
                .filter(|archive| !archive.is_empty())
                .map(str::to_string)
                .collect(),
        })
        .collect())
}
