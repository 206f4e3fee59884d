use crate::error::QtdlError;
use crate::types::{Catalog, Choice, Kit, Level, Selection};
use crate::version::sort_versions;
use anyhow::Result;
use std::collections::BTreeMap;
use std::fmt::Write;

/// Check every concrete level of `selection` against what was discovered.
///
/// Stops at the first level that does not match; deeper levels mean nothing
/// without a valid parent. Returns the kit when every level is concrete.
pub fn validate(catalog: &Catalog, selection: &Selection) -> Result<Option<Kit>, QtdlError> {
    let Some(os) = check(Level::Os, &selection.os, Some(&catalog.oses))? else {
        return Ok(None);
    };
    let Some(target) = check(Level::Target, &selection.target, catalog.targets(os))? else {
        return Ok(None);
    };
    let Some(version) = check(
        Level::Version,
        &selection.version,
        catalog.versions(os, target),
    )?
    else {
        return Ok(None);
    };

    if let Choice::Concrete(toolchain) = &selection.toolchain {
        let known = catalog.toolchains(os, target, version);
        if !known.is_some_and(|set| set.contains(toolchain)) {
            return Err(QtdlError::UnknownValue {
                level: Level::Toolchain,
                value: toolchain.clone(),
                alternatives: known.map(|set| set.iter().cloned().collect()).unwrap_or_default(),
            });
        }
    }

    selection.kit()
}

/// Membership check for one level; `None` when the level is not concrete.
fn check<'a, V>(
    level: Level,
    choice: &'a Choice,
    known: Option<&BTreeMap<String, V>>,
) -> Result<Option<&'a str>, QtdlError> {
    let Choice::Concrete(value) = choice else {
        return Ok(None);
    };
    match known {
        Some(children) if children.contains_key(value) => Ok(Some(value)),
        _ => {
            let names = known.map(|children| children.keys()).into_iter().flatten();
            let alternatives = if level == Level::Version {
                sort_versions(names)
            } else {
                names.cloned().collect()
            };
            Err(QtdlError::UnknownValue {
                level,
                value: value.clone(),
                alternatives,
            })
        }
    }
}

/// Output format for a discovery run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
    Yaml,
}

pub fn render_catalog(catalog: &Catalog, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(catalog)?),
        OutputFormat::Yaml => Ok(serde_yaml::to_string(catalog)?),
        OutputFormat::Plain => Ok(render_plain(catalog)),
    }
}

/// Indented tree of everything that was expanded. Versions are listed in
/// numeric order.
fn render_plain(catalog: &Catalog) -> String {
    let mut out = String::new();
    for (os, targets) in &catalog.oses {
        let _ = writeln!(out, "{}", os);
        let Some(targets) = targets else { continue };
        for (target, versions) in targets {
            let _ = writeln!(out, "  {}", target);
            let Some(versions) = versions else { continue };
            for version in sort_versions(versions.keys()) {
                let _ = writeln!(out, "    {}", version);
                if let Some(Some(toolchains)) = versions.get(&version) {
                    for toolchain in toolchains {
                        let _ = writeln!(out, "      {}", toolchain);
                    }
                }
            }
        }
    }
    out
}
