//! Datamodel catalog wiring.
//!
//! Each DAP version is described by one JSON document under `catalogs/`,
//! checked against `schema/datamodel_catalog.schema.json`. Types in `model`
//! mirror the document fields; callers query the validated `VersionEntry`
//! for one version and the `DataModelRegistry` across all of them.

pub mod identity;
pub mod index;
pub mod model;
pub mod repository;
pub mod schema;

pub use identity::{DapVersion, Generation};
pub use index::{HeaderKeywords, VersionEntry};
pub use model::{
    BinTypeDef, BitmaskDef, CatalogDefinition, ChannelDef, FlagDef, PropertyDef, ReleaseDef,
    TemplateDef,
};
pub use repository::{DataModelRegistry, RegistryBuilder};
pub use schema::{SUPPORTED_SCHEMA_VERSIONS, validate_catalog_value};

pub use model::load_catalog_from_path;
