//! Deserializable representation of a datamodel catalog document.
//!
//! One document describes one DAP version: the releases built with it, its
//! properties and channels, bintypes, templates and bitmask schemas. These
//! structs mirror `schema/datamodel_catalog.schema.json`; `VersionEntry`
//! turns a definition into the validated, frozen form callers query.

use crate::catalog::identity::{DapVersion, Generation};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Catalog documents compiled into the crate, oldest first.
const EMBEDDED_CATALOGS: &[(&str, &str)] = &[
    (
        "catalogs/dap_1.1.1.json",
        include_str!("../../catalogs/dap_1.1.1.json"),
    ),
    (
        "catalogs/dap_2.0.2.json",
        include_str!("../../catalogs/dap_2.0.2.json"),
    ),
    (
        "catalogs/dap_2.1.3.json",
        include_str!("../../catalogs/dap_2.1.3.json"),
    ),
];

#[derive(Clone, Debug, Deserialize, Serialize)]
/// Full catalog for one DAP version as stored on disk.
pub struct CatalogDefinition {
    pub schema_version: String,
    pub dap_version: DapVersion,
    pub generation: Generation,
    pub releases: Vec<ReleaseDef>,
    pub properties: Vec<PropertyDef>,
    pub bintypes: Vec<BinTypeDef>,
    pub default_bintype: String,
    pub templates: Vec<TemplateDef>,
    pub default_template: String,
    #[serde(default)]
    pub bitmasks: BTreeMap<String, BitmaskDef>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
/// Release that was produced with this catalog's DAP version.
pub struct ReleaseDef {
    pub name: String,
    pub drp_version: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PropertyDef {
    pub name: String,
    #[serde(default)]
    pub channels: Vec<ChannelDef>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub ivar: bool,
    #[serde(default)]
    pub mask: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ChannelDef {
    pub name: String,
    #[serde(default)]
    pub unit: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct BinTypeDef {
    pub name: String,
    pub id: u32,
    pub binned: bool,
    #[serde(default)]
    pub description: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TemplateDef {
    pub name: String,
    pub id: u32,
    #[serde(default)]
    pub description: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct BitmaskDef {
    #[serde(default)]
    pub description: String,
    pub flags: Vec<FlagDef>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct FlagDef {
    pub bit: u8,
    pub label: String,
    #[serde(default)]
    pub description: String,
}

impl CatalogDefinition {
    /// Parse a definition from an already-validated JSON value.
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).context("decoding catalog definition")
    }
}

/// Raw JSON for every embedded catalog, tagged with its source name.
pub(crate) fn embedded_catalog_sources() -> impl Iterator<Item = (&'static str, &'static str)> {
    EMBEDDED_CATALOGS.iter().copied()
}

/// Read and parse a catalog document from disk without additional validation.
pub fn load_catalog_from_path(path: &Path) -> Result<CatalogDefinition> {
    let data = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let catalog: CatalogDefinition =
        serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))?;
    Ok(catalog)
}
