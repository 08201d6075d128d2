//! JSON Schema validation for catalog documents.
//!
//! Every catalog, embedded or loaded from disk, is checked against
//! `schema/datamodel_catalog.schema.json` before it is deserialized, so shape
//! errors are reported with schema paths rather than serde positions.

use anyhow::{Context, Result, anyhow, bail};
use jsonschema::JSONSchema;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::OnceLock;

const CATALOG_SCHEMA_JSON: &str = include_str!("../../schema/datamodel_catalog.schema.json");

/// Catalog document versions this build understands.
pub const SUPPORTED_SCHEMA_VERSIONS: &[&str] = &["marvin_datamodel_v1"];

static CATALOG_SCHEMA: OnceLock<Value> = OnceLock::new();

fn catalog_schema() -> Result<&'static Value> {
    if let Some(existing) = CATALOG_SCHEMA.get() {
        return Ok(existing);
    }
    let loaded: Value =
        serde_json::from_str(CATALOG_SCHEMA_JSON).context("parsing embedded catalog schema")?;
    Ok(CATALOG_SCHEMA.get_or_init(move || loaded))
}

static COMPILED_SCHEMA: OnceLock<JSONSchema> = OnceLock::new();

fn compiled_schema() -> Result<&'static JSONSchema> {
    if let Some(existing) = COMPILED_SCHEMA.get() {
        return Ok(existing);
    }
    let compiled = JSONSchema::compile(catalog_schema()?)
        .map_err(|err| anyhow!("compiling catalog schema: {err}"))?;
    Ok(COMPILED_SCHEMA.get_or_init(move || compiled))
}

/// Validate a catalog document against the schema and the supported
/// `schema_version` set.
pub fn validate_catalog_value(source: &str, value: &Value) -> Result<()> {
    let schema_version = value
        .get("schema_version")
        .and_then(Value::as_str)
        .unwrap_or_default();
    validate_schema_version(schema_version).with_context(|| format!("catalog {source}"))?;

    if let Err(errors) = compiled_schema()?.validate(value) {
        let details = errors
            .map(|err| format!("{} at {}", err, err.instance_path))
            .collect::<Vec<_>>()
            .join("\n");
        bail!("catalog {source} failed schema validation:\n{details}");
    }
    Ok(())
}

fn validate_schema_version(schema_version: &str) -> Result<()> {
    if schema_version.is_empty() {
        bail!("schema_version must not be empty");
    }

    let allowed: BTreeSet<&str> = SUPPORTED_SCHEMA_VERSIONS.iter().copied().collect();
    if !allowed.contains(schema_version) {
        bail!(
            "schema_version '{}' not in allowed set {:?}",
            schema_version,
            allowed
        );
    }

    Ok(())
}
