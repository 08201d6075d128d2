use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

/// DAP pipeline version keying one catalog (e.g., `2.0.2`).
///
/// Stored in canonical dotted form. Header-style spellings such as `v2_0_2`
/// are accepted by [`DapVersion::parse`] and normalized on the way in, so two
/// spellings of the same version always land on the same registry entry.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DapVersion(pub String);

impl DapVersion {
    /// Normalize a raw version string into canonical dotted form.
    ///
    /// Returns `None` unless the input is a non-empty run of numeric
    /// components separated by `.` or `_`, optionally prefixed with `v`.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let body = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);
        let parts = body
            .split(['.', '_'])
            .map(|part| {
                if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
                    None
                } else {
                    Some(part)
                }
            })
            .collect::<Option<Vec<_>>>()?;
        Some(Self(parts.join(".")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric components, used to order versions by release chronology.
    pub fn components(&self) -> Vec<u64> {
        self.0
            .split('.')
            .map(|part| part.parse::<u64>().unwrap_or(0))
            .collect()
    }

    /// Compare two versions numerically (`2.10.0` sorts after `2.9.1`).
    pub fn chronological_cmp(&self, other: &Self) -> Ordering {
        self.components().cmp(&other.components())
    }
}

impl fmt::Display for DapVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pipeline generation a catalog belongs to.
///
/// The earliest generation (MPL-4 era products) uses different header
/// keywords, file naming and feature sets. The tag is declared by each catalog
/// document rather than derived from version comparisons at call sites.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Generation {
    Legacy,
    Modern,
}

impl Serialize for Generation {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Generation {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::from_str(&value)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown generation '{value}'")))
    }
}

impl Generation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Generation::Legacy => "legacy",
            Generation::Modern => "modern",
        }
    }

    fn from_str(value: &str) -> Option<Self> {
        match value {
            "legacy" => Some(Generation::Legacy),
            "modern" => Some(Generation::Modern),
            _ => None,
        }
    }
}
