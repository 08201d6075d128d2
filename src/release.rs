//! Release identifiers and the drp-version normalization applied before any
//! table lookup.
//!
//! A release (`MPL-5`, `DR13`) names one data-processing campaign and maps to
//! exactly one (drp_version, dap_version) pair. The table itself is assembled
//! from catalog documents by the registry builder; this module owns the key
//! normalization rules so every entry point spells keys the same way.

use crate::catalog::DapVersion;
use serde::Serialize;

/// Historical drp-version spellings and the version they stand for.
///
/// MPL-4 products were written with `v1_5_0` in their headers although the
/// release is `v1_5_1`.
const DRP_VERSION_ALIASES: &[(&str, &str)] = &[("v1_5_0", "v1_5_1")];

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
/// One release row: public name plus the pipeline versions behind it.
pub struct ReleaseInfo {
    pub name: String,
    pub drp_version: String,
    pub dap_version: DapVersion,
}

impl ReleaseInfo {
    /// The (drp_version, dap_version) pair for this release.
    pub fn versions(&self) -> (&str, &str) {
        (&self.drp_version, self.dap_version.as_str())
    }
}

/// Canonical spelling of a release name (`mpl-5` → `MPL-5`).
pub fn normalize_release_name(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

/// Canonical spelling of a drp version with the historical alias applied.
pub fn normalize_drp_version(raw: &str) -> String {
    let trimmed = raw.trim().to_ascii_lowercase();
    DRP_VERSION_ALIASES
        .iter()
        .find(|(alias, _)| *alias == trimmed)
        .map(|(_, canonical)| (*canonical).to_string())
        .unwrap_or(trimmed)
}

/// Every spelling that resolves to `canonical`: itself, then its aliases.
pub fn drp_version_spellings(canonical: &str) -> impl Iterator<Item = &str> {
    std::iter::once(canonical).chain(
        DRP_VERSION_ALIASES
            .iter()
            .filter(move |(_, target)| *target == canonical)
            .map(|(alias, _)| *alias),
    )
}

/// True when `raw` is shaped like a drp version (`v1_5_1`).
pub fn looks_like_drp_version(raw: &str) -> bool {
    let trimmed = raw.trim();
    let Some(body) = trimmed.strip_prefix('v').or_else(|| trimmed.strip_prefix('V')) else {
        return false;
    };
    !body.is_empty()
        && body
            .split('_')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
}
