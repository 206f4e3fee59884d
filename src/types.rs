use crate::error::QtdlError;
use crate::version::{is_valid_version, VersionIdentifier};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Sentinel accepted on the command line for "discover this level and stop".
pub const UNSPECIFIED: &str = "unspecified";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Os,
    Target,
    Version,
    Toolchain,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Level::Os => "OS",
            Level::Target => "target",
            Level::Version => "version",
            Level::Toolchain => "toolchain",
        };
        write!(f, "{}", name)
    }
}

/// One level of a selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Choice {
    Unspecified,
    /// Resolve to the host platform (OS level only).
    Auto,
    /// Resolve to the highest published version (version level only).
    Latest,
    Concrete(String),
}

impl Choice {
    /// Interpret a raw argument for the given level. "auto" and "latest" are
    /// sentinels only where the level accepts them.
    pub fn parse(level: Level, raw: &str) -> Self {
        match (level, raw) {
            (_, UNSPECIFIED) | (_, "") => Choice::Unspecified,
            (Level::Os, "auto") => Choice::Auto,
            (Level::Version, "latest") => Choice::Latest,
            (_, value) => Choice::Concrete(value.to_string()),
        }
    }

    pub fn is_unspecified(&self) -> bool {
        matches!(self, Choice::Unspecified)
    }

    pub fn concrete(&self) -> Option<&str> {
        match self {
            Choice::Concrete(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Choice::Unspecified => write!(f, "{}", UNSPECIFIED),
            Choice::Auto => write!(f, "auto"),
            Choice::Latest => write!(f, "latest"),
            Choice::Concrete(value) => write!(f, "{}", value),
        }
    }
}

/// What the user asked for, level by level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub os: Choice,
    pub target: Choice,
    pub version: Choice,
    pub toolchain: Choice,
}

impl Selection {
    /// Build a selection from raw positional arguments.
    ///
    /// Levels after the first unspecified one are dropped, and a concrete
    /// version must be in dotted `major.minor.patch` form.
    pub fn from_args(os: &str, target: &str, version: &str, toolchain: &str) -> Result<Self, QtdlError> {
        let mut choices = [
            Choice::parse(Level::Os, os),
            Choice::parse(Level::Target, target),
            Choice::parse(Level::Version, version),
            Choice::parse(Level::Toolchain, toolchain),
        ];

        if let Some(first_open) = choices.iter().position(Choice::is_unspecified) {
            for choice in choices.iter_mut().skip(first_open + 1) {
                if !choice.is_unspecified() {
                    tracing::warn!("Ignoring '{}': an earlier level is unspecified", choice);
                    *choice = Choice::Unspecified;
                }
            }
        }

        let [os, target, version, toolchain] = choices;
        if let Choice::Concrete(v) = &version {
            if !is_valid_version(v) {
                return Err(QtdlError::MalformedVersion(v.clone()));
            }
        }

        Ok(Self {
            os,
            target,
            version,
            toolchain,
        })
    }

    pub fn get(&self, level: Level) -> &Choice {
        match level {
            Level::Os => &self.os,
            Level::Target => &self.target,
            Level::Version => &self.version,
            Level::Toolchain => &self.toolchain,
        }
    }

    /// The fully concrete kit, if every level is resolved.
    pub fn kit(&self) -> Result<Option<Kit>, QtdlError> {
        match (
            self.os.concrete(),
            self.target.concrete(),
            self.version.concrete(),
            self.toolchain.concrete(),
        ) {
            (Some(os), Some(target), Some(version), Some(toolchain)) => Ok(Some(Kit {
                os: os.to_string(),
                target: target.to_string(),
                version: version.parse()?,
                toolchain: toolchain.to_string(),
            })),
            _ => Ok(None),
        }
    }
}

/// A concrete (os, target, version, toolchain) selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kit {
    pub os: String,
    pub target: String,
    pub version: VersionIdentifier,
    pub toolchain: String,
}

impl fmt::Display for Kit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Qt {} {} {} {}",
            self.version, self.os, self.target, self.toolchain
        )
    }
}

/// A named record from an `Updates.xml` manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackageRecord {
    pub name: String,
    pub version: String,
    pub archives: Vec<String>,
}

pub type Toolchains = BTreeSet<String>;
pub type Versions = BTreeMap<String, Option<Toolchains>>;
pub type Targets = BTreeMap<String, Option<Versions>>;

/// What the resolver discovered upstream. `None` at any level means
/// the level was not expanded.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct Catalog {
    pub oses: BTreeMap<String, Option<Targets>>,
}

impl Catalog {
    pub fn targets(&self, os: &str) -> Option<&Targets> {
        self.oses.get(os).and_then(Option::as_ref)
    }

    pub fn versions(&self, os: &str, target: &str) -> Option<&Versions> {
        self.targets(os)?.get(target).and_then(Option::as_ref)
    }

    pub fn toolchains(&self, os: &str, target: &str, version: &str) -> Option<&Toolchains> {
        self.versions(os, target)?
            .get(version)
            .and_then(Option::as_ref)
    }
}
