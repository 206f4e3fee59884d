//! Walks the repository one level at a time (OS, target, version, toolchain)
//! and records what exists in a [`Catalog`].
//!
//! Only the branches the selection points at are expanded. A concrete level
//! narrows the walk to that one child; the first unspecified level is listed
//! and the walk stops there, unless expand-all asks for every child below it.

use crate::error::QtdlError;
use crate::platform::{host_os_label, is_supported_os_dir, os_dir, os_label};
use crate::remote::{list_directories, Remote};
use crate::types::{Catalog, Choice, Level, Selection, Targets, Toolchains, Versions};
use crate::version::{is_valid_version, latest_version, VersionIdentifier};
use anyhow::Result;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

/// Pseudo-targets that hold no installable kits.
pub const BLOCKED_TARGETS: &[&str] = &["root", "addons", "profiles"];

/// Last package-name segments that name something other than a toolchain.
pub const RESERVED_TOOLCHAIN_PREFIXES: &[&str] = &["qt", "debug", "doc", "examples", "src"];

/// Result of a resolve pass: the selection with `auto`/`latest` replaced by
/// concrete values, and everything discovered on the way.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub selection: Selection,
    pub catalog: Catalog,
}

/// Mutable state for a single resolve pass.
struct ResolutionContext {
    expand_all: bool,
    selection: Selection,
    version_index: Option<BTreeSet<String>>,
}

impl ResolutionContext {
    /// Whether the child `name` at `level` should be expanded further.
    fn descend(&self, level: Level, name: &str) -> bool {
        match self.selection.get(level) {
            Choice::Concrete(value) => value == name,
            Choice::Unspecified => self.expand_all,
            Choice::Auto | Choice::Latest => false,
        }
    }
}

pub struct HierarchyResolver<'a, R: Remote> {
    remote: &'a R,
    base_url: String,
    version_index_url: String,
}

impl<'a, R: Remote> HierarchyResolver<'a, R> {
    pub fn new(remote: &'a R, base_url: &str, version_index_url: &str) -> Self {
        Self {
            remote,
            base_url: base_url.to_string(),
            version_index_url: version_index_url.to_string(),
        }
    }

    pub async fn resolve(&self, selection: &Selection, expand_all: bool) -> Result<Resolution> {
        let mut ctx = ResolutionContext {
            expand_all,
            selection: selection.clone(),
            version_index: None,
        };
        if ctx.selection.os == Choice::Auto {
            let host = host_os_label();
            tracing::info!("Resolved OS 'auto' to '{}'", host);
            ctx.selection.os = Choice::Concrete(host);
        }

        let mut catalog = Catalog::default();
        let oses = self
            .expand_level(&self.base_url, is_supported_os_dir, |dir| Some(os_label(dir)))
            .await?;

        for os in oses {
            let targets = if ctx.descend(Level::Os, &os) {
                Some(self.resolve_targets(&mut ctx, &os).await?)
            } else {
                None
            };
            catalog.oses.insert(os, targets);
        }

        Ok(Resolution {
            selection: ctx.selection,
            catalog,
        })
    }

    async fn resolve_targets(&self, ctx: &mut ResolutionContext, os: &str) -> Result<Targets> {
        let url = format!("{}{}", self.base_url, os_dir(os));
        let names = self
            .expand_level(
                &url,
                |dir| !BLOCKED_TARGETS.contains(&dir.trim_end_matches('/')),
                strip_separator,
            )
            .await?;

        let mut targets = BTreeMap::new();
        for target in names {
            let versions = if ctx.descend(Level::Target, &target) {
                Some(self.resolve_versions(ctx, os, &target).await?)
            } else {
                None
            };
            targets.insert(target, versions);
        }
        Ok(targets)
    }

    async fn resolve_versions(
        &self,
        ctx: &mut ResolutionContext,
        os: &str,
        target: &str,
    ) -> Result<Versions> {
        let known = match &ctx.version_index {
            Some(known) => known.clone(),
            None => {
                let fetched = self.fetch_version_index().await?;
                ctx.version_index = Some(fetched.clone());
                fetched
            }
        };

        if ctx.selection.version == Choice::Latest {
            let latest = latest_version(&known).ok_or_else(|| QtdlError::UnknownValue {
                level: Level::Version,
                value: "latest".to_string(),
                alternatives: Vec::new(),
            })?;
            tracing::info!("Resolved version 'latest' to '{}'", latest);
            ctx.selection.version = Choice::Concrete(latest);
        }

        let mut versions = BTreeMap::new();
        for version in known {
            let toolchains = if ctx.descend(Level::Version, &version) {
                Some(self.resolve_toolchains(os, target, &version).await?)
            } else {
                None
            };
            versions.insert(version, toolchains);
        }
        Ok(versions)
    }

    async fn resolve_toolchains(&self, os: &str, target: &str, version: &str) -> Result<Toolchains> {
        let version: VersionIdentifier = version.parse()?;
        let url = package_dir_url(&self.base_url, os, target, &version);

        match self
            .expand_level(&url, |_| true, toolchain_from_package_dir)
            .await
        {
            Ok(toolchains) => Ok(toolchains),
            Err(err) if is_not_found(&err) => {
                tracing::debug!("No packages for {} {} {}", os, target, version);
                Ok(BTreeSet::new())
            }
            Err(err) => Err(err),
        }
    }

    /// Flatten `<index>/<major.minor>/<major.minor.patch>/` into full versions.
    async fn fetch_version_index(&self) -> Result<BTreeSet<String>> {
        let series = self
            .expand_level(&self.version_index_url, is_series_dir, strip_separator)
            .await?;

        let mut versions = BTreeSet::new();
        for minor in series {
            let url = format!("{}{}/", self.version_index_url, minor);
            let full = self
                .expand_level(
                    &url,
                    |dir| is_valid_version(dir.trim_end_matches('/')),
                    strip_separator,
                )
                .await?;
            versions.extend(full);
        }
        tracing::debug!("Version index has {} versions", versions.len());
        Ok(versions)
    }

    /// List one directory, keep the children `keep` accepts and name them
    /// with `rename` (which may still drop a child by returning `None`).
    async fn expand_level<P, M>(&self, url: &str, keep: P, rename: M) -> Result<BTreeSet<String>>
    where
        P: Fn(&str) -> bool,
        M: Fn(&str) -> Option<String>,
    {
        let dirs = list_directories(self.remote, url).await?;
        Ok(dirs
            .iter()
            .filter(|dir| keep(dir.as_str()))
            .filter_map(|dir| rename(dir.as_str()))
            .collect())
    }
}

/// Directory holding the packages (and `Updates.xml`) of one kit version.
pub fn package_dir_url(base_url: &str, os: &str, target: &str, version: &VersionIdentifier) -> String {
    format!(
        "{}{}{}/qt{}_{}/",
        base_url,
        os_dir(os),
        target,
        version.major,
        version.compact()
    )
}

fn strip_separator(dir: &str) -> Option<String> {
    let name = dir.trim_end_matches('/');
    (!name.is_empty()).then(|| name.to_string())
}

fn is_series_dir(dir: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+\.\d+/$").expect("static regex"))
        .is_match(dir)
}

/// `qt.qt5.5152.gcc_64/` -> `gcc_64`.
pub fn toolchain_from_package_dir(dir: &str) -> Option<String> {
    let last = dir.split('.').skip(2).last()?;
    if RESERVED_TOOLCHAIN_PREFIXES
        .iter()
        .any(|prefix| last.starts_with(prefix))
    {
        return None;
    }

    let mut chars = last.chars();
    chars.next_back();
    let name = chars.as_str();
    if name.is_empty() || name.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(name.to_string())
}

fn is_not_found(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<QtdlError>(),
        Some(QtdlError::NotFound { .. })
    )
}
