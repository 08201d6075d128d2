//! Validated, read-only view of one DAP version's catalog.
//!
//! `VersionEntry` is strict about structural invariants: unique names, an
//! existing default bintype and template, and exactly one unbinned bintype.
//! Violations fail construction so they surface while the registry is being
//! built, never while a caller is resolving names.

use crate::bitmask::{Bitmask, Flag};
use crate::catalog::identity::{DapVersion, Generation};
use crate::catalog::model::{BinTypeDef, CatalogDefinition, PropertyDef, TemplateDef};
use crate::error::{DataModelError, Result};
use crate::options::{BinType, DapType, MAX_OPTION_ID, Template};
use crate::property::{Channel, Property, PropertyList};
use crate::release::{ReleaseInfo, normalize_drp_version, normalize_release_name};
use anyhow::{Context, bail};
use std::collections::{BTreeMap, BTreeSet};

/// Header keyword used by modern products to mark the unbinned scheme.
const MODERN_HEADER_UNBINNED: &str = "NONE";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Primary-header keywords carrying configuration and version information.
pub struct HeaderKeywords {
    pub bintype: &'static str,
    pub template: &'static str,
    pub dap_version: Option<&'static str>,
}

const LEGACY_HEADER_KEYWORDS: HeaderKeywords = HeaderKeywords {
    bintype: "BINTYPE",
    template: "TPLKEY",
    dap_version: None,
};

const MODERN_HEADER_KEYWORDS: HeaderKeywords = HeaderKeywords {
    bintype: "BINKEY",
    template: "SCKEY",
    dap_version: Some("VERSDAP"),
};

#[derive(Debug)]
/// Per-version bundle of properties, bintypes, templates and bitmasks.
pub struct VersionEntry {
    dap_version: DapVersion,
    generation: Generation,
    releases: Vec<ReleaseInfo>,
    properties: PropertyList,
    bintypes: Vec<BinType>,
    default_bintype: usize,
    unbinned: usize,
    templates: Vec<Template>,
    default_template: usize,
    bitmasks: BTreeMap<String, Bitmask>,
}

impl VersionEntry {
    /// Validate a catalog definition and freeze it.
    pub fn from_definition(def: CatalogDefinition) -> anyhow::Result<Self> {
        let dap_version = DapVersion::parse(def.dap_version.as_str())
            .with_context(|| format!("invalid dap_version '{}'", def.dap_version))?;

        let releases = build_releases(&dap_version, &def)?;
        let properties = PropertyList::new(dap_version.clone(), build_properties(&def.properties))?;
        let (bintypes, default_bintype, unbinned) =
            build_bintypes(&dap_version, &def.bintypes, &def.default_bintype)?;
        let (templates, default_template) =
            build_templates(&dap_version, &def.templates, &def.default_template)?;

        let mut bitmasks = BTreeMap::new();
        let mut schema_keys = BTreeSet::new();
        for (schema, mask_def) in def.bitmasks {
            if !schema_keys.insert(schema.trim().to_ascii_uppercase()) {
                bail!("DAP {dap_version} defines bitmask schema {schema} twice, ignoring case");
            }
            let flags = mask_def
                .flags
                .into_iter()
                .map(|flag| Flag {
                    bit: flag.bit,
                    label: flag.label,
                    description: flag.description,
                })
                .collect();
            let bitmask = Bitmask::new(schema.clone(), mask_def.description, flags)
                .with_context(|| format!("DAP {dap_version}"))?;
            bitmasks.insert(schema, bitmask);
        }

        Ok(Self {
            dap_version,
            generation: def.generation,
            releases,
            properties,
            bintypes,
            default_bintype,
            unbinned,
            templates,
            default_template,
            bitmasks,
        })
    }

    pub fn dap_version(&self) -> &DapVersion {
        &self.dap_version
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// True for the earliest pipeline generation.
    pub fn is_legacy(&self) -> bool {
        self.generation == Generation::Legacy
    }

    /// Releases produced with this DAP version, in catalog order.
    pub fn releases(&self) -> &[ReleaseInfo] {
        &self.releases
    }

    pub fn properties(&self) -> &PropertyList {
        &self.properties
    }

    pub fn bintypes(&self) -> &[BinType] {
        &self.bintypes
    }

    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    /// Resolve a bintype name (case-insensitive); `None` yields the default.
    pub fn get_bintype(&self, name: Option<&str>) -> Result<&BinType> {
        let Some(name) = name else {
            return Ok(&self.bintypes[self.default_bintype]);
        };
        let wanted = name.trim();
        self.bintypes
            .iter()
            .find(|bintype| bintype.name.eq_ignore_ascii_case(wanted))
            .ok_or_else(|| DataModelError::InvalidBinType {
                name: name.to_string(),
                valid: self.bintypes.iter().map(|b| b.name.clone()).collect(),
            })
    }

    /// Resolve a template name (case-insensitive); `None` yields the default.
    pub fn get_template(&self, name: Option<&str>) -> Result<&Template> {
        let Some(name) = name else {
            return Ok(&self.templates[self.default_template]);
        };
        let wanted = name.trim();
        self.templates
            .iter()
            .find(|template| template.name.eq_ignore_ascii_case(wanted))
            .ok_or_else(|| DataModelError::InvalidTemplate {
                name: name.to_string(),
                valid: self.templates.iter().map(|t| t.name.clone()).collect(),
            })
    }

    /// The one bintype whose data are not spatially binned.
    pub fn get_unbinned(&self) -> &BinType {
        &self.bintypes[self.unbinned]
    }

    /// Bitmask schema by name (case-insensitive).
    pub fn bitmask(&self, schema: &str) -> Result<&Bitmask> {
        let wanted = schema.trim().to_ascii_uppercase();
        self.bitmasks
            .get(&wanted)
            .or_else(|| {
                self.bitmasks
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(&wanted))
                    .map(|(_, mask)| mask)
            })
            .ok_or_else(|| DataModelError::UnknownBitmaskSchema {
                schema: schema.to_string(),
                valid: self.bitmasks.keys().cloned().collect(),
            })
    }

    pub fn bitmasks(&self) -> &BTreeMap<String, Bitmask> {
        &self.bitmasks
    }

    /// Product key for a bintype/template combination.
    ///
    /// Both options are resolved by name against this version, so records
    /// taken from another version fail with `InvalidBinType`/`InvalidTemplate`.
    pub fn daptype(&self, bintype: &BinType, template: &Template) -> Result<DapType> {
        let bintype = self.get_bintype(Some(&bintype.name))?;
        let template = self.get_template(Some(&template.name))?;
        if !self.is_legacy() {
            return Ok(DapType::modern(bintype, template));
        }
        // Build bounds every id by MAX_OPTION_ID, so the iteration number fits.
        DapType::legacy(bintype, template).ok_or_else(|| DataModelError::InvalidBinType {
            name: bintype.name.clone(),
            valid: self.bintypes.iter().map(|b| b.name.clone()).collect(),
        })
    }

    /// Header keywords holding bintype, template and DAP version.
    pub fn header_keywords(&self) -> HeaderKeywords {
        if self.is_legacy() {
            LEGACY_HEADER_KEYWORDS
        } else {
            MODERN_HEADER_KEYWORDS
        }
    }

    /// Resolve the bintype recorded in a product header.
    ///
    /// Modern headers spell the unbinned scheme `NONE`; it maps to this
    /// version's unbinned bintype.
    pub fn bintype_from_header(&self, raw: &str) -> Result<&BinType> {
        let value = raw.trim().to_ascii_uppercase();
        if !self.is_legacy() && value == MODERN_HEADER_UNBINNED {
            return Ok(self.get_unbinned());
        }
        self.get_bintype(Some(&value))
    }

    /// Resolve the template recorded in a product header.
    pub fn template_from_header(&self, raw: &str) -> Result<&Template> {
        let value = raw.trim().to_ascii_uppercase();
        self.get_template(Some(&value))
    }
}

fn build_releases(dap_version: &DapVersion, def: &CatalogDefinition) -> anyhow::Result<Vec<ReleaseInfo>> {
    if def.releases.is_empty() {
        bail!("DAP {dap_version} lists no releases");
    }
    let mut seen = BTreeSet::new();
    let mut releases = Vec::with_capacity(def.releases.len());
    for release in &def.releases {
        let name = normalize_release_name(&release.name);
        if name.is_empty() {
            bail!("DAP {dap_version} lists a release with no name");
        }
        if !seen.insert(name.clone()) {
            bail!("DAP {dap_version} lists release {name} twice");
        }
        releases.push(ReleaseInfo {
            name,
            drp_version: normalize_drp_version(&release.drp_version),
            dap_version: dap_version.clone(),
        });
    }
    Ok(releases)
}

fn build_properties(defs: &[PropertyDef]) -> Vec<Property> {
    defs.iter()
        .map(|def| {
            let channels = def
                .channels
                .iter()
                .map(|channel| Channel::new(channel.name.clone(), channel.unit.clone()))
                .collect();
            Property::new(
                def.name.clone(),
                channels,
                def.unit.clone(),
                def.description.clone(),
                def.ivar,
                def.mask,
            )
        })
        .collect()
}

fn build_bintypes(
    dap_version: &DapVersion,
    defs: &[BinTypeDef],
    default_name: &str,
) -> anyhow::Result<(Vec<BinType>, usize, usize)> {
    let mut names = BTreeSet::new();
    let mut ids = BTreeSet::new();
    let mut bintypes = Vec::with_capacity(defs.len());
    for def in defs {
        let name = def.name.trim().to_ascii_uppercase();
        if !names.insert(name.clone()) {
            bail!("DAP {dap_version} defines bintype {name} twice");
        }
        if def.id > MAX_OPTION_ID {
            bail!(
                "DAP {dap_version} bintype {name} id {} exceeds {MAX_OPTION_ID}",
                def.id
            );
        }
        if !ids.insert(def.id) {
            bail!("DAP {dap_version} reuses bintype id {} for {name}", def.id);
        }
        bintypes.push(BinType {
            name,
            id: def.id,
            binned: def.binned,
            description: def.description.clone(),
        });
    }

    let unbinned: Vec<usize> = bintypes
        .iter()
        .enumerate()
        .filter(|(_, bintype)| !bintype.binned)
        .map(|(idx, _)| idx)
        .collect();
    let [unbinned] = unbinned.as_slice() else {
        bail!(
            "DAP {dap_version} must define exactly one unbinned bintype, found {}",
            unbinned.len()
        );
    };

    let default = bintypes
        .iter()
        .position(|bintype| bintype.name.eq_ignore_ascii_case(default_name.trim()))
        .with_context(|| format!("DAP {dap_version} default bintype {default_name} is not defined"))?;

    Ok((bintypes, default, *unbinned))
}

fn build_templates(
    dap_version: &DapVersion,
    defs: &[TemplateDef],
    default_name: &str,
) -> anyhow::Result<(Vec<Template>, usize)> {
    let mut names = BTreeSet::new();
    let mut ids = BTreeSet::new();
    let mut templates = Vec::with_capacity(defs.len());
    for def in defs {
        let name = def.name.trim().to_ascii_uppercase();
        if !names.insert(name.clone()) {
            bail!("DAP {dap_version} defines template {name} twice");
        }
        if def.id > MAX_OPTION_ID {
            bail!(
                "DAP {dap_version} template {name} id {} exceeds {MAX_OPTION_ID}",
                def.id
            );
        }
        if !ids.insert(def.id) {
            bail!("DAP {dap_version} reuses template id {} for {name}", def.id);
        }
        templates.push(Template {
            name,
            id: def.id,
            description: def.description.clone(),
        });
    }

    let default = templates
        .iter()
        .position(|template| template.name.eq_ignore_ascii_case(default_name.trim()))
        .with_context(|| format!("DAP {dap_version} default template {default_name} is not defined"))?;

    Ok((templates, default))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn legacy_fixture() -> Value {
        json!({
            "schema_version": "marvin_datamodel_v1",
            "dap_version": "v1_1_1",
            "generation": "legacy",
            "releases": [{"name": "mpl-4", "drp_version": "v1_5_0"}],
            "properties": [
                {"name": "stellar_vel", "unit": "km/s", "ivar": true, "mask": true},
                {"name": "emline_gflux", "channels": [{"name": "ha_6564"}], "ivar": true, "mask": true}
            ],
            "bintypes": [
                {"name": "NONE", "id": 3, "binned": false},
                {"name": "STON", "id": 1, "binned": true}
            ],
            "default_bintype": "none",
            "templates": [
                {"name": "MILES-THIN", "id": 1},
                {"name": "MIUSCAT-THIN", "id": 2}
            ],
            "default_template": "MIUSCAT-THIN",
            "bitmasks": {
                "MANGA_TARGET1": {"flags": [{"bit": 0, "label": "NONE"}, {"bit": 2, "label": "SECONDARY_COM"}]}
            }
        })
    }

    fn modern_fixture() -> Value {
        let mut value = legacy_fixture();
        value["dap_version"] = json!("2.0.2");
        value["generation"] = json!("modern");
        value["releases"] = json!([{"name": "MPL-5", "drp_version": "v2_0_1"}]);
        value["bintypes"] = json!([
            {"name": "SPX", "id": 2, "binned": false},
            {"name": "VOR10", "id": 3, "binned": true}
        ]);
        value["default_bintype"] = json!("SPX");
        value["templates"] = json!([{"name": "GAU-MILESHC", "id": 0}]);
        value["default_template"] = json!("GAU-MILESHC");
        value
    }

    fn entry(value: Value) -> anyhow::Result<VersionEntry> {
        VersionEntry::from_definition(CatalogDefinition::from_value(value)?)
    }

    #[test]
    fn normalizes_versions_and_release_names() {
        let entry = entry(legacy_fixture()).unwrap();
        assert_eq!(entry.dap_version().as_str(), "1.1.1");
        assert!(entry.is_legacy());
        let release = &entry.releases()[0];
        assert_eq!(release.name, "MPL-4");
        assert_eq!(release.drp_version, "v1_5_1");
    }

    #[test]
    fn defaults_and_case_insensitive_lookup() {
        let entry = entry(legacy_fixture()).unwrap();
        assert_eq!(entry.get_bintype(None).unwrap().name, "NONE");
        assert_eq!(entry.get_template(None).unwrap().name, "MIUSCAT-THIN");
        assert_eq!(entry.get_bintype(Some("ston")).unwrap().id, 1);
        assert_eq!(entry.get_template(Some(" miles-thin ")).unwrap().id, 1);
        assert_eq!(entry.get_unbinned().name, "NONE");
    }

    #[test]
    fn unknown_options_list_valid_names() {
        let entry = entry(legacy_fixture()).unwrap();
        assert_eq!(
            entry.get_bintype(Some("VOR10")).unwrap_err(),
            DataModelError::InvalidBinType {
                name: "VOR10".to_string(),
                valid: vec!["NONE".to_string(), "STON".to_string()],
            }
        );
        assert!(matches!(
            entry.get_template(Some("GAU-MILESHC")),
            Err(DataModelError::InvalidTemplate { .. })
        ));
    }

    #[test]
    fn bitmask_lookup() {
        let entry = entry(legacy_fixture()).unwrap();
        let target = entry.bitmask("manga_target1").unwrap();
        assert_eq!(target.decode(5), vec!["NONE", "SECONDARY_COM"]);
        let err = entry.bitmask("MANGA_DAPQUAL").unwrap_err();
        assert_eq!(
            err,
            DataModelError::UnknownBitmaskSchema {
                schema: "MANGA_DAPQUAL".to_string(),
                valid: vec!["MANGA_TARGET1".to_string()],
            }
        );
    }

    #[test]
    fn generation_selects_daptype_and_header_keywords() {
        let legacy = entry(legacy_fixture()).unwrap();
        let daptype = legacy
            .daptype(
                legacy.get_bintype(None).unwrap(),
                legacy.get_template(None).unwrap(),
            )
            .unwrap();
        assert_eq!(
            daptype,
            DapType::Legacy {
                bintype: "NONE".to_string(),
                niter: 23
            }
        );
        assert_eq!(legacy.header_keywords().template, "TPLKEY");
        assert_eq!(legacy.header_keywords().dap_version, None);

        let modern = entry(modern_fixture()).unwrap();
        let daptype = modern
            .daptype(
                modern.get_bintype(Some("VOR10")).unwrap(),
                modern.get_template(None).unwrap(),
            )
            .unwrap();
        assert_eq!(daptype, DapType::Modern("VOR10-GAU-MILESHC".to_string()));
        assert_eq!(modern.header_keywords().bintype, "BINKEY");
        assert_eq!(modern.header_keywords().dap_version, Some("VERSDAP"));
    }

    #[test]
    fn daptype_rejects_options_from_another_version() {
        let legacy = entry(legacy_fixture()).unwrap();
        let modern = entry(modern_fixture()).unwrap();
        let err = legacy
            .daptype(
                modern.get_bintype(Some("VOR10")).unwrap(),
                legacy.get_template(None).unwrap(),
            )
            .unwrap_err();
        assert!(matches!(err, DataModelError::InvalidBinType { .. }));
        let err = modern
            .daptype(
                modern.get_bintype(None).unwrap(),
                legacy.get_template(None).unwrap(),
            )
            .unwrap_err();
        assert!(matches!(err, DataModelError::InvalidTemplate { .. }));
    }

    #[test]
    fn rejects_option_ids_beyond_the_iteration_range() {
        let mut huge_bintype = legacy_fixture();
        huge_bintype["bintypes"][0]["id"] = json!(u32::MAX);
        let err = entry(huge_bintype).unwrap_err();
        assert!(err.to_string().contains("exceeds 9999"), "{err:#}");

        let mut huge_template = legacy_fixture();
        huge_template["templates"][1]["id"] = json!(10_000);
        let err = entry(huge_template).unwrap_err();
        assert!(err.to_string().contains("template MIUSCAT-THIN id 10000"), "{err:#}");
    }

    #[test]
    fn largest_ids_still_produce_an_iteration_number() {
        let mut value = legacy_fixture();
        value["bintypes"][0]["id"] = json!(9999);
        value["templates"][1]["id"] = json!(9999);
        let legacy = entry(value).unwrap();
        let daptype = legacy
            .daptype(
                legacy.get_bintype(None).unwrap(),
                legacy.get_template(None).unwrap(),
            )
            .unwrap();
        assert_eq!(daptype.to_string(), "NONE-99999999");
    }

    #[test]
    fn rejects_bitmask_schemas_differing_only_in_case() {
        let mut value = legacy_fixture();
        value["bitmasks"]["manga_target1"] = json!({"flags": [{"bit": 1, "label": "OTHER"}]});
        let err = entry(value).unwrap_err();
        assert!(err.to_string().contains("twice, ignoring case"), "{err:#}");
    }

    #[test]
    fn header_bintype_none_means_unbinned_for_modern_products() {
        let modern = entry(modern_fixture()).unwrap();
        assert_eq!(modern.bintype_from_header(" none ").unwrap().name, "SPX");
        assert_eq!(modern.bintype_from_header("vor10").unwrap().name, "VOR10");
        assert_eq!(
            modern.template_from_header("gau-mileshc ").unwrap().name,
            "GAU-MILESHC"
        );

        let legacy = entry(legacy_fixture()).unwrap();
        assert_eq!(legacy.bintype_from_header("NONE").unwrap().name, "NONE");
    }

    #[test]
    fn rejects_missing_or_duplicate_unbinned_bintype() {
        let mut none_unbinned = modern_fixture();
        none_unbinned["bintypes"] = json!([{"name": "VOR10", "id": 3, "binned": true}]);
        none_unbinned["default_bintype"] = json!("VOR10");
        let err = entry(none_unbinned).unwrap_err();
        assert!(err.to_string().contains("exactly one unbinned"), "{err:#}");

        let mut two_unbinned = modern_fixture();
        two_unbinned["bintypes"] = json!([
            {"name": "SPX", "id": 2, "binned": false},
            {"name": "RAW", "id": 4, "binned": false}
        ]);
        let err = entry(two_unbinned).unwrap_err();
        assert!(err.to_string().contains("found 2"), "{err:#}");
    }

    #[test]
    fn rejects_missing_defaults() {
        let mut bad_bintype = modern_fixture();
        bad_bintype["default_bintype"] = json!("HYB10");
        let err = entry(bad_bintype).unwrap_err();
        assert!(err.to_string().contains("default bintype HYB10"), "{err:#}");

        let mut bad_template = modern_fixture();
        bad_template["default_template"] = json!("MILES-THIN");
        let err = entry(bad_template).unwrap_err();
        assert!(err.to_string().contains("default template MILES-THIN"), "{err:#}");
    }

    #[test]
    fn rejects_duplicate_names_and_ids() {
        let mut dup_name = modern_fixture();
        dup_name["bintypes"] = json!([
            {"name": "SPX", "id": 2, "binned": false},
            {"name": "spx", "id": 3, "binned": true}
        ]);
        assert!(entry(dup_name).unwrap_err().to_string().contains("twice"));

        let mut dup_id = modern_fixture();
        dup_id["templates"] = json!([
            {"name": "GAU-MILESHC", "id": 0},
            {"name": "OTHER", "id": 0}
        ]);
        assert!(entry(dup_id).unwrap_err().to_string().contains("reuses template id"));

        let mut dup_release = modern_fixture();
        dup_release["releases"] = json!([
            {"name": "MPL-5", "drp_version": "v2_0_1"},
            {"name": "mpl-5", "drp_version": "v2_0_2"}
        ]);
        assert!(entry(dup_release).unwrap_err().to_string().contains("twice"));
    }
}
