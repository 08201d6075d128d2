#![allow(dead_code)]

use anyhow::{Context, Result};
use marvin_datamodel::{DataModelRegistry, RegistryBuilder};
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};

pub fn embedded_registry() -> DataModelRegistry {
    DataModelRegistry::embedded().expect("embedded catalogs must build")
}

/// Minimal valid catalog document for one version.
pub fn catalog_document(dap_version: &str, generation: &str, release: &str, drp: &str) -> Value {
    json!({
        "schema_version": "marvin_datamodel_v1",
        "dap_version": dap_version,
        "generation": generation,
        "releases": [{"name": release, "drp_version": drp}],
        "properties": [
            {"name": "binid"},
            {"name": "stellar_vel", "unit": "km/s", "ivar": true, "mask": true},
            {
                "name": "emline_gflux",
                "unit": "1e-17 erg/s/cm^2/spaxel",
                "ivar": true,
                "mask": true,
                "channels": [{"name": "ha_6564"}, {"name": "hb_4862"}]
            }
        ],
        "bintypes": [
            {"name": "SPX", "id": 0, "binned": false},
            {"name": "HYB10", "id": 1, "binned": true}
        ],
        "default_bintype": "HYB10",
        "templates": [{"name": "MILESHC-MASTARHC2", "id": 0}],
        "default_template": "MILESHC-MASTARHC2",
        "bitmasks": {
            "MANGA_DAPQUAL": {"flags": [{"bit": 0, "label": "FORESTAR"}, {"bit": 1, "label": "BADZ"}]}
        }
    })
}

pub fn write_catalog(dir: &Path, file_name: &str, value: &Value) -> Result<PathBuf> {
    let path = dir.join(file_name);
    let data = serde_json::to_string_pretty(value)?;
    fs::write(&path, data).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

pub fn builder_with_embedded() -> RegistryBuilder {
    RegistryBuilder::new()
        .with_embedded()
        .expect("embedded catalogs must validate")
}
