//! Qt version identifiers.
//!
//! The repository spells versions two ways: dotted (`5.15.2`) in the version
//! index and in manifests, and compact (`5152`) in directory and package
//! names. The compact form is ambiguous for multi-digit components, so it is
//! always read as one major digit, one patch digit and a minor in between.

use crate::error::QtdlError;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct VersionIdentifier {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl VersionIdentifier {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Decode the compact form used in repository paths.
    pub fn decode(compact: &str) -> Result<Self, QtdlError> {
        let malformed = || QtdlError::MalformedVersion(compact.to_string());

        if !compact.is_ascii() || compact.len() < 2 {
            return Err(malformed());
        }

        let (major, rest) = compact.split_at(1);
        let (minor, patch) = if rest.len() <= 1 {
            (rest, "0")
        } else {
            rest.split_at(rest.len() - 1)
        };

        let number = |segment: &str| segment.parse::<u64>().map_err(|_| malformed());
        Ok(Self::new(number(major)?, number(minor)?, number(patch)?))
    }

    /// Compact form: the components joined without separators.
    pub fn compact(&self) -> String {
        format!("{}{}{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for VersionIdentifier {
    type Err = QtdlError;

    /// Parse the dotted `major.minor.patch` form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !is_valid_version(s) {
            return Err(QtdlError::MalformedVersion(s.to_string()));
        }
        let parsed =
            semver::Version::parse(s).map_err(|_| QtdlError::MalformedVersion(s.to_string()))?;
        Ok(Self::new(parsed.major, parsed.minor, parsed.patch))
    }
}

impl fmt::Display for VersionIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

fn dotted_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+\.\d+\.\d+$").expect("static regex"))
}

/// True if `s` is a selectable `major.minor.patch` version.
pub fn is_valid_version(s: &str) -> bool {
    dotted_re().is_match(s) && semver::Version::parse(s).is_ok()
}

/// Sort dotted versions numerically, dropping anything unparseable.
pub fn sort_versions<'a, I>(versions: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut parsed: Vec<(VersionIdentifier, &String)> = versions
        .into_iter()
        .filter_map(|v| v.parse().ok().map(|id| (id, v)))
        .collect();
    parsed.sort();
    parsed.into_iter().map(|(_, v)| v.clone()).collect()
}

/// The numerically highest dotted version.
pub fn latest_version<'a, I>(versions: I) -> Option<String>
where
    I: IntoIterator<Item = &'a String>,
{
    sort_versions(versions).pop()
}
