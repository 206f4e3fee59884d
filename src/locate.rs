//! Finds the manifest records to install for a kit and its companion tools.

use crate::error::QtdlError;
use crate::platform::{os_dir, required_tool_arch};
use crate::remote::{list_directories, read_manifest, Remote};
use crate::resolver::package_dir_url;
use crate::types::{Kit, PackageRecord};
use anyhow::Result;

/// Prefix shared by every package name in the repository.
pub const PACKAGE_NAMESPACE: &str = "qt";
/// Prefix of companion tool package names.
pub const TOOLS_NAMESPACE: &str = "qt.tools";
/// Tool directories carry this marker in front of the tool name.
pub const TOOL_DIR_MARKER: &str = "tools_";

pub const CRYPTO_TOOL: &str = "openssl";
pub const COMPILER_TOOL: &str = "mingw";

/// A manifest record together with the directory its archives live under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedPackage {
    pub record: PackageRecord,
    /// Directory that holds `Updates.xml`; archives are at
    /// `<base_url><name>/<version><archive>`.
    pub base_url: String,
}

impl LocatedPackage {
    pub fn archive_url(&self, archive: &str) -> String {
        format!(
            "{}{}/{}",
            self.base_url,
            self.record.name,
            self.archive_file_name(archive)
        )
    }

    /// Name of the archive as served (and staged locally).
    pub fn archive_file_name(&self, archive: &str) -> String {
        format!("{}{}", self.record.version, archive)
    }
}

/// How a package family recognizes its record in a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamePattern {
    /// `qt.` ... `.<compact>.<toolchain>`
    Kit { compact: String, toolchain: String },
    /// `qt.tools.<tool>.` ... `<distribution>`
    Distribution { tool: String, distribution: String },
    /// Exactly this name.
    Exact(String),
}

impl NamePattern {
    pub fn matches(&self, name: &str) -> bool {
        match self {
            NamePattern::Kit { compact, toolchain } => {
                name.starts_with(&format!("{}.", PACKAGE_NAMESPACE))
                    && name.ends_with(&format!(".{}.{}", compact, toolchain))
            }
            NamePattern::Distribution { tool, distribution } => {
                name.starts_with(&format!("{}.{}.", TOOLS_NAMESPACE, tool))
                    && name.ends_with(distribution.as_str())
            }
            NamePattern::Exact(expected) => name == expected,
        }
    }

    fn describe(&self) -> String {
        match self {
            NamePattern::Kit { compact, toolchain } => {
                format!("{}.*.{}.{}", PACKAGE_NAMESPACE, compact, toolchain)
            }
            NamePattern::Distribution { tool, distribution } => {
                format!("{}.{}.*{}", TOOLS_NAMESPACE, tool, distribution)
            }
            NamePattern::Exact(expected) => expected.clone(),
        }
    }
}

pub struct PackageLocator<'a, R: Remote> {
    remote: &'a R,
    base_url: String,
}

impl<'a, R: Remote> PackageLocator<'a, R> {
    pub fn new(remote: &'a R, base_url: &str) -> Self {
        Self {
            remote,
            base_url: base_url.to_string(),
        }
    }

    /// The main Qt package for a kit.
    pub async fn locate_kit(&self, kit: &Kit) -> Result<LocatedPackage> {
        let dir = package_dir_url(&self.base_url, &kit.os, &kit.target, &kit.version);
        let pattern = NamePattern::Kit {
            compact: kit.version.compact(),
            toolchain: kit.toolchain.clone(),
        };
        self.find_in_manifest(&dir, &pattern).await
    }

    /// The crypto library bundle matching the kit's architecture.
    pub async fn locate_crypto_tool(&self, kit: &Kit) -> Result<LocatedPackage> {
        let arch = required_tool_arch(&kit.os, &kit.toolchain).ok_or_else(|| {
            QtdlError::PackageNotFound {
                pattern: format!("{}{} for {}", TOOL_DIR_MARKER, CRYPTO_TOOL, kit.toolchain),
                url: self.target_url(kit),
            }
        })?;

        let tool_dir = self
            .find_tool_dir(kit, CRYPTO_TOOL, Some(arch))
            .await?;
        let distribution = tool_dir
            .strip_prefix(&format!("{}{}", TOOL_DIR_MARKER, CRYPTO_TOOL))
            .unwrap_or(&tool_dir)
            .trim_start_matches('_')
            .to_string();

        let dir = format!("{}{}/", self.target_url(kit), tool_dir);
        let pattern = NamePattern::Distribution {
            tool: CRYPTO_TOOL.to_string(),
            distribution,
        };
        self.find_in_manifest(&dir, &pattern).await
    }

    /// The MinGW compiler bundle for a MinGW kit on Windows.
    pub async fn locate_compiler_tool(&self, kit: &Kit) -> Result<LocatedPackage> {
        let wanted = format!("{}.{}", TOOLS_NAMESPACE, kit.toolchain);
        if kit.os != "windows" || !kit.toolchain.contains(COMPILER_TOOL) {
            return Err(QtdlError::PackageNotFound {
                pattern: wanted,
                url: self.target_url(kit),
            }
            .into());
        }

        let tool_dir = self.find_tool_dir(kit, COMPILER_TOOL, None).await?;
        let dir = format!("{}{}/", self.target_url(kit), tool_dir);

        let packages = list_directories(self.remote, &dir).await?;
        let package = packages
            .iter()
            .map(|p| p.trim_end_matches('/'))
            .find(|p| p.starts_with(&wanted))
            .ok_or_else(|| QtdlError::PackageNotFound {
                pattern: format!("{}*", wanted),
                url: dir.clone(),
            })?;

        self.find_in_manifest(&dir, &NamePattern::Exact(package.to_string()))
            .await
    }

    /// Pick the `tools_<name>[_<arch>]` directory under the kit's target.
    /// With no `arch`, only the plain `tools_<name>` form is accepted.
    async fn find_tool_dir(&self, kit: &Kit, tool: &str, arch: Option<&str>) -> Result<String> {
        let url = self.target_url(kit);
        let dirs = list_directories(self.remote, &url).await?;

        let found = dirs
            .iter()
            .map(|dir| dir.trim_end_matches('/'))
            .filter(|dir| dir.starts_with(TOOL_DIR_MARKER))
            .find(|dir| {
                let parts: Vec<&str> = dir.split('_').collect();
                if parts.get(1) != Some(&tool) || parts.last() == Some(&"src") {
                    return false;
                }
                match arch {
                    Some(arch) => parts.len() >= 3 && parts.last() == Some(&arch),
                    None => parts.len() == 2,
                }
            });

        match found {
            Some(dir) => {
                tracing::debug!("Using tool directory {} for {}", dir, tool);
                Ok(dir.to_string())
            }
            None => Err(QtdlError::PackageNotFound {
                pattern: format!(
                    "{}{}{}",
                    TOOL_DIR_MARKER,
                    tool,
                    arch.map(|a| format!("_{}", a)).unwrap_or_default()
                ),
                url,
            }
            .into()),
        }
    }

    async fn find_in_manifest(&self, dir: &str, pattern: &NamePattern) -> Result<LocatedPackage> {
        let url = format!("{}Updates.xml", dir);
        let records = read_manifest(self.remote, &url).await?;

        let record = records
            .into_iter()
            .find(|record| pattern.matches(&record.name))
            .ok_or_else(|| QtdlError::PackageNotFound {
                pattern: pattern.describe(),
                url: url.clone(),
            })?;

        tracing::info!("Found package {} ({})", record.name, record.version);
        Ok(LocatedPackage {
            record,
            base_url: dir.to_string(),
        })
    }

    fn target_url(&self, kit: &Kit) -> String {
        format!("{}{}{}/", self.base_url, os_dir(&kit.os), kit.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::testing::FakeRemote;
    use crate::version::VersionIdentifier;

    const BASE: &str = "https://repo.test/online/qtsdkrepository/";

    fn manifest(records: &[(&str, &str, &str)]) -> String {
        let mut xml = String::from("<Updates>\n");
        for (name, version, archives) in records {
            xml.push_str(&format!(
                "<PackageUpdate><Name>{}</Name><Version>{}</Version><DownloadableArchives>{}</DownloadableArchives></PackageUpdate>\n",
                name, version, archives
            ));
        }
        xml.push_str("</Updates>\n");
        xml
    }

    fn kit(os: &str, target: &str, version: VersionIdentifier, toolchain: &str) -> Kit {
        Kit {
            os: os.to_string(),
            target: target.to_string(),
            version,
            toolchain: toolchain.to_string(),
        }
    }

    #[tokio::test]
    async fn test_locate_kit_record() {
        let remote = FakeRemote::new().with_page(
            &format!("{}linux_x64/desktop/qt5_5152/Updates.xml", BASE),
            &manifest(&[
                ("qt.qt5.5152.debug_info.gcc_64", "5.15.2", "a.7z"),
                ("qt.qt5.5152.gcc_64", "5.15.2", "qtbase-x.7z, qtsvg-x.7z"),
            ]),
        );
        let locator = PackageLocator::new(&remote, BASE);
        let located = locator
            .locate_kit(&kit("linux", "desktop", VersionIdentifier::new(5, 15, 2), "gcc_64"))
            .await
            .unwrap();

        assert_eq!(located.record.name, "qt.qt5.5152.gcc_64");
        assert_eq!(located.record.archives, vec!["qtbase-x.7z", "qtsvg-x.7z"]);
        assert_eq!(
            located.archive_url("qtbase-x.7z"),
            format!(
                "{}linux_x64/desktop/qt5_5152/qt.qt5.5152.gcc_64/5.15.2qtbase-x.7z",
                BASE
            )
        );
    }

    #[tokio::test]
    async fn test_locate_kit_missing_record() {
        let remote = FakeRemote::new().with_page(
            &format!("{}linux_x64/desktop/qt5_5152/Updates.xml", BASE),
            &manifest(&[("qt.qt5.5152.wasm_32", "5.15.2", "qtbase-w.7z")]),
        );
        let locator = PackageLocator::new(&remote, BASE);
        let err = locator
            .locate_kit(&kit("linux", "desktop", VersionIdentifier::new(5, 15, 2), "gcc_64"))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<QtdlError>(),
            Some(QtdlError::PackageNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_locate_crypto_tool_by_arch() {
        let remote = FakeRemote::new()
            .with_dirs(
                &format!("{}windows_x86/desktop/", BASE),
                &[
                    "qt5_5152/",
                    "tools_openssl_src/",
                    "tools_openssl_x86/",
                    "tools_openssl_x64/",
                    "tools_mingw/",
                ],
            )
            .with_page(
                &format!("{}windows_x86/desktop/tools_openssl_x64/Updates.xml", BASE),
                &manifest(&[
                    ("qt.tools.openssl.src", "1.1.1", "src.7z"),
                    ("qt.tools.openssl.win_x64", "1.1.1-4", "openssl_1.1.1j_prebuild_x64.7z"),
                ]),
            );
        let locator = PackageLocator::new(&remote, BASE);
        let located = locator
            .locate_crypto_tool(&kit(
                "windows",
                "desktop",
                VersionIdentifier::new(5, 15, 2),
                "win64_msvc2019_64",
            ))
            .await
            .unwrap();
        assert_eq!(located.record.name, "qt.tools.openssl.win_x64");
    }

    #[tokio::test]
    async fn test_crypto_tool_without_rule_is_not_found() {
        let remote = FakeRemote::new();
        let locator = PackageLocator::new(&remote, BASE);
        let err = locator
            .locate_crypto_tool(&kit("mac", "desktop", VersionIdentifier::new(5, 15, 2), "clang_64"))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<QtdlError>(),
            Some(QtdlError::PackageNotFound { .. })
        ));
        assert!(remote.requested().is_empty());
    }

    #[tokio::test]
    async fn test_locate_compiler_tool_exact_name() {
        let remote = FakeRemote::new()
            .with_dirs(
                &format!("{}windows_x86/desktop/", BASE),
                &["tools_mingw/", "tools_openssl_x64/"],
            )
            .with_dirs(
                &format!("{}windows_x86/desktop/tools_mingw/", BASE),
                &["qt.tools.win32_mingw810/", "qt.tools.win64_mingw810/"],
            )
            .with_page(
                &format!("{}windows_x86/desktop/tools_mingw/Updates.xml", BASE),
                &manifest(&[
                    ("qt.tools.win32_mingw810", "8.1.0-1", "i686.7z"),
                    ("qt.tools.win64_mingw810", "8.1.0-1", "x86_64.7z"),
                ]),
            );
        let locator = PackageLocator::new(&remote, BASE);
        let located = locator
            .locate_compiler_tool(&kit(
                "windows",
                "desktop",
                VersionIdentifier::new(5, 15, 2),
                "win64_mingw81",
            ))
            .await
            .unwrap();
        assert_eq!(located.record.name, "qt.tools.win64_mingw810");
        assert_eq!(located.record.archives, vec!["x86_64.7z"]);
    }

    #[test]
    fn test_name_patterns() {
        let kit = NamePattern::Kit {
            compact: "5152".to_string(),
            toolchain: "gcc_64".to_string(),
        };
        assert!(kit.matches("qt.qt5.5152.gcc_64"));
        assert!(!kit.matches("qt.qt5.5152.wasm_32"));
        assert!(!kit.matches("other.qt5.5152.gcc_64"));

        let dist = NamePattern::Distribution {
            tool: "openssl".to_string(),
            distribution: "x64".to_string(),
        };
        assert!(dist.matches("qt.tools.openssl.win_x64"));
        assert!(!dist.matches("qt.tools.openssl.win_x86"));
        assert!(!dist.matches("qt.tools.opensslx64"));
    }
}
