//! Downloads, extracts and fixes up located packages.
//!
//! Archives are processed one at a time. Each archive is staged on disk only
//! for the duration of its own download and extraction: the staged file is
//! removed when its [`StagedArchive`] guard drops, whether extraction
//! succeeded, failed or was interrupted.

use crate::download::download_file;
use crate::error::QtdlError;
use crate::locate::LocatedPackage;
use crate::platform::{extraction_hint, toolchain_install_dir};
use crate::types::Kit;
use anyhow::{Context, Result};
use regex::Regex;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::watch;

pub const QT_CONF_CONTENT: &str = "[Paths]\nPrefix=..\n";

#[derive(Debug, Clone)]
pub struct InstallOptions {
    /// Where extracted trees land.
    pub output_dir: PathBuf,
    /// Where archives are downloaded before extraction.
    pub staging_dir: PathBuf,
    /// Only install archives whose module is listed; empty means all.
    pub modules: Vec<String>,
    /// Extraction tool (7z compatible).
    pub archive_tool: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub installed: Vec<String>,
    pub skipped: Vec<String>,
}

/// Removes a staged archive when dropped.
struct StagedArchive {
    path: PathBuf,
}

impl Drop for StagedArchive {
    fn drop(&mut self) {
        if !self.path.exists() {
            return;
        }
        // A cancelled write can keep the handle open for a moment on Windows.
        let removed = fs::remove_file(&self.path).or_else(|_| {
            std::thread::sleep(Duration::from_millis(100));
            fs::remove_file(&self.path)
        });
        match removed {
            Ok(()) => tracing::debug!("Removed {}", self.path.display()),
            Err(e) => tracing::warn!("Could not remove {}: {}", self.path.display(), e),
        }
    }
}

/// One cancellation source shared by every phase of an install.
///
/// Once triggered it stays triggered, so a Ctrl-C that lands between two
/// phases is still seen by the next one.
#[derive(Clone)]
pub struct Interrupt {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for Interrupt {
    fn default() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger on the first Ctrl-C for the rest of the process.
    pub fn on_ctrl_c() -> Self {
        let interrupt = Self::new();
        let trigger = interrupt.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::debug!("Received Ctrl-C");
                trigger.trigger();
            }
        });
        interrupt
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn check(&self) -> Result<(), QtdlError> {
        if self.is_triggered() {
            Err(QtdlError::Interrupted)
        } else {
            Ok(())
        }
    }

    /// Resolves once triggered; immediately if that already happened.
    pub async fn triggered(&self) {
        let mut rx = self.tx.subscribe();
        if rx.wait_for(|hit| *hit).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Run `work`, abandoning it if the interrupt fires first.
    pub async fn guard<T, F>(&self, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            _ = self.triggered() => Err(QtdlError::Interrupted.into()),
            result = work => result,
        }
    }
}

/// Module an archive belongs to: the text before its first `-`.
pub fn archive_module(archive: &str) -> &str {
    archive.split('-').next().unwrap_or(archive)
}

pub struct Installer {
    client: reqwest::Client,
    options: InstallOptions,
}

impl Installer {
    pub fn new(client: reqwest::Client, options: InstallOptions) -> Self {
        Self { client, options }
    }

    pub fn wants(&self, archive: &str) -> bool {
        self.options.modules.is_empty()
            || self
                .options
                .modules
                .iter()
                .any(|module| module == archive_module(archive))
    }

    /// Install every wanted archive of `package`, stopping at the first
    /// failure. A triggered `interrupt` aborts with [`QtdlError::Interrupted`].
    pub async fn install(&self, package: &LocatedPackage, interrupt: &Interrupt) -> Result<InstallReport> {
        self.install_until(package, interrupt.triggered()).await
    }

    /// Like [`Installer::install`], interrupted when `interrupt` completes.
    pub async fn install_until<F>(&self, package: &LocatedPackage, interrupt: F) -> Result<InstallReport>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(interrupt);
        let mut report = InstallReport::default();

        for archive in &package.record.archives {
            if !self.wants(archive) {
                tracing::info!("Skipping {} (module not requested)", archive);
                report.skipped.push(archive.clone());
                continue;
            }

            let staged = StagedArchive {
                path: self
                    .options
                    .staging_dir
                    .join(package.archive_file_name(archive)),
            };
            let url = package.archive_url(archive);

            tokio::select! {
                biased;
                _ = &mut interrupt => {
                    tracing::warn!("Interrupted while installing {}", archive);
                    return Err(QtdlError::Interrupted.into());
                }
                result = self.fetch_and_extract(&url, &staged.path) => {
                    result.with_context(|| format!("Could not install {}", archive))?;
                }
            }

            report.installed.push(archive.clone());
        }

        Ok(report)
    }

    async fn fetch_and_extract(&self, url: &str, archive_path: &Path) -> Result<()> {
        download_file(&self.client, url, archive_path).await?;
        self.extract(archive_path).await
    }

    async fn extract(&self, archive_path: &Path) -> Result<()> {
        let archive = archive_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        tracing::info!("Extracting {}...", archive);

        fs::create_dir_all(&self.options.output_dir).with_context(|| {
            format!(
                "Could not create output directory {}",
                self.options.output_dir.display()
            )
        })?;

        let output = Command::new(&self.options.archive_tool)
            .arg("x")
            .arg("-aoa")
            .arg("-bd")
            .arg("-y")
            .arg(format!("-o{}", self.options.output_dir.display()))
            .arg(archive_path)
            .kill_on_drop(true)
            .output()
            .await;

        let failure = |reason: String| QtdlError::ExtractionFailed {
            archive: archive.clone(),
            reason,
            hint: extraction_hint().to_string(),
        };

        match output {
            Ok(output) if output.status.success() => Ok(()),
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                tracing::debug!("{} stderr: {}", self.options.archive_tool, stderr.trim());
                Err(failure(format!("{} exited with {}", self.options.archive_tool, output.status)).into())
            }
            Err(e) => Err(failure(format!("could not run '{}': {}", self.options.archive_tool, e)).into()),
        }
    }

    /// Make a freshly extracted kit relocatable and, if the open source
    /// license was accepted, mark it as an open source build.
    pub fn post_install(&self, kit: &Kit, accept_license: bool) -> Result<()> {
        let prefix = self
            .options
            .output_dir
            .join(kit.version.to_string())
            .join(toolchain_install_dir(&kit.toolchain));

        write_qt_conf(&prefix)?;

        if accept_license {
            patch_qconfig(&prefix)?;
        } else {
            tracing::warn!(
                "Open source license not accepted (--accept-license); leaving {} untouched",
                prefix.join("mkspecs").join("qconfig.pri").display()
            );
        }
        Ok(())
    }
}

/// Write `bin/qt.conf` unless one already exists.
pub fn write_qt_conf(prefix: &Path) -> Result<bool> {
    let bin_dir = prefix.join("bin");
    let qt_conf = bin_dir.join("qt.conf");
    if qt_conf.exists() {
        tracing::debug!("{} already exists", qt_conf.display());
        return Ok(false);
    }

    fs::create_dir_all(&bin_dir)?;
    fs::write(&qt_conf, QT_CONF_CONTENT)
        .with_context(|| format!("Could not write {}", qt_conf.display()))?;
    tracing::info!("Wrote {}", qt_conf.display());
    Ok(true)
}

fn licheck_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^([ \t]*QT_LICHECK[ \t]*=).*$").expect("static regex"))
}

fn edition_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^([ \t]*QT_EDITION[ \t]*=[ \t]*)Enterprise[ \t]*$").expect("static regex")
    })
}

/// Switch `mkspecs/qconfig.pri` to the open source edition in place.
pub fn patch_qconfig(prefix: &Path) -> Result<bool> {
    let qconfig = prefix.join("mkspecs").join("qconfig.pri");
    if !qconfig.exists() {
        tracing::warn!("{} not found; skipping license patch", qconfig.display());
        return Ok(false);
    }

    let content = fs::read_to_string(&qconfig)
        .with_context(|| format!("Could not read {}", qconfig.display()))?;
    let patched = edition_re().replace_all(&content, "${1}OpenSource");
    let patched = licheck_re().replace_all(&patched, "${1}");

    if patched != content {
        fs::write(&qconfig, patched.as_bytes())
            .with_context(|| format!("Could not write {}", qconfig.display()))?;
        tracing::info!("Patched {}", qconfig.display());
    }
    Ok(true)
}
