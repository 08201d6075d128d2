//! Versioned datamodel registry for MaNGA DAP data products.
//!
//! The crate maps public releases (`MPL-5`, `DR13`) to the pipeline versions
//! that produced them and, for each DAP version, exposes the catalog of
//! properties, channels, bintypes, templates and bitmask schemas. Name
//! resolution is strict about ambiguity: partial names that fit more than one
//! entry fail with every candidate listed rather than picking one.
//!
//! Catalogs ship embedded in the crate and are validated once, when the
//! registry is built. After that every query is a pure read, safe to run from
//! any number of threads.

use anyhow::{Result, anyhow};
use std::sync::OnceLock;

pub mod bitmask;
pub mod catalog;
pub mod config;
pub mod error;
pub mod options;
pub mod property;
pub mod release;

pub use bitmask::{Bitmask, Flag};
pub use catalog::{
    CatalogDefinition, DapVersion, DataModelRegistry, Generation, HeaderKeywords,
    RegistryBuilder, VersionEntry, load_catalog_from_path,
};
pub use config::{RegistryConfig, split_path_list};
pub use error::DataModelError;
pub use options::{BinType, DapType, Template};
pub use property::{Channel, Property, PropertyList, PropertyMatch};
pub use release::{ReleaseInfo, normalize_drp_version, normalize_release_name};

static DATAMODEL: OnceLock<std::result::Result<DataModelRegistry, String>> = OnceLock::new();

/// Process-wide registry built from [`RegistryConfig::from_env`].
///
/// The first caller builds the registry; concurrent first calls wait for that
/// single build. A failed build is reported again on every call.
pub fn datamodel() -> Result<&'static DataModelRegistry> {
    let built = DATAMODEL.get_or_init(|| {
        RegistryBuilder::from_config(&RegistryConfig::from_env())
            .and_then(RegistryBuilder::build)
            .map_err(|err| format!("{err:#}"))
    });
    built
        .as_ref()
        .map_err(|err| anyhow!("building datamodel registry: {err}"))
}

/// Whether `dap_version` belongs to the legacy pipeline generation, according
/// to the process-wide registry. Unknown versions are not legacy.
pub fn is_legacy(dap_version: &str) -> Result<bool> {
    Ok(datamodel()?.is_legacy(dap_version))
}
