//! Registry of every known DAP version, keyed by release and version.
//!
//! `RegistryBuilder` collects catalog documents (embedded, from disk, or
//! supplied by the caller), validates them and freezes the result into a
//! `DataModelRegistry`. After `build` returns the registry is read-only, so
//! it can be shared across threads without locks.

use crate::catalog::identity::{DapVersion, Generation};
use crate::catalog::index::VersionEntry;
use crate::catalog::model::{CatalogDefinition, embedded_catalog_sources};
use crate::catalog::schema::validate_catalog_value;
use crate::config::RegistryConfig;
use crate::error::{DataModelError, Result};
use crate::release::{
    ReleaseInfo, drp_version_spellings, looks_like_drp_version, normalize_drp_version,
    normalize_release_name,
};
use anyhow::{Context, bail};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::ops::Index;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Default)]
/// Collects catalog definitions and validates them into a registry.
pub struct RegistryBuilder {
    definitions: Vec<(String, CatalogDefinition)>,
    default_release: Option<String>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder preloaded with the embedded catalogs and the configured
    /// extra catalogs and default release.
    pub fn from_config(config: &RegistryConfig) -> anyhow::Result<Self> {
        let mut builder = Self::new();
        if config.include_embedded {
            builder = builder.with_embedded()?;
        }
        for path in &config.catalog_paths {
            builder = builder.with_catalog_path(path)?;
        }
        if let Some(release) = &config.default_release {
            builder = builder.default_release(release);
        }
        Ok(builder)
    }

    /// Add the catalogs compiled into the crate.
    pub fn with_embedded(mut self) -> anyhow::Result<Self> {
        for (source, raw) in embedded_catalog_sources() {
            let value: Value = serde_json::from_str(raw)
                .with_context(|| format!("parsing embedded catalog {source}"))?;
            self = self.with_value(source, value)?;
        }
        Ok(self)
    }

    /// Add a catalog document after checking it against the catalog schema.
    pub fn with_value(mut self, source: &str, value: Value) -> anyhow::Result<Self> {
        validate_catalog_value(source, &value)?;
        let definition =
            CatalogDefinition::from_value(value).with_context(|| format!("catalog {source}"))?;
        self.definitions.push((source.to_string(), definition));
        Ok(self)
    }

    /// Add an already-typed definition. Structural checks still run in `build`.
    pub fn with_definition(mut self, source: &str, definition: CatalogDefinition) -> Self {
        self.definitions.push((source.to_string(), definition));
        self
    }

    /// Add a catalog file, or every `*.json` file in a directory (name order).
    pub fn with_catalog_path(mut self, path: &Path) -> anyhow::Result<Self> {
        if path.is_dir() {
            for file in json_files_in(path)? {
                self = self.with_catalog_file(&file)?;
            }
            Ok(self)
        } else {
            self.with_catalog_file(path)
        }
    }

    fn with_catalog_file(self, path: &Path) -> anyhow::Result<Self> {
        let data =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let value: Value =
            serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))?;
        self.with_value(&path.display().to_string(), value)
    }

    /// Release reported by `DataModelRegistry::current`.
    pub fn default_release(mut self, release: impl AsRef<str>) -> Self {
        self.default_release = Some(normalize_release_name(release.as_ref()));
        self
    }

    /// Validate every definition and freeze the registry.
    ///
    /// A later definition for an already-registered DAP version replaces the
    /// earlier one, so on-disk catalogs can override embedded ones.
    pub fn build(self) -> anyhow::Result<DataModelRegistry> {
        if self.definitions.is_empty() {
            bail!("no catalogs registered");
        }

        let mut by_version: BTreeMap<DapVersion, VersionEntry> = BTreeMap::new();
        for (source, definition) in self.definitions {
            let entry = VersionEntry::from_definition(definition)
                .with_context(|| format!("catalog {source}"))?;
            debug!(
                source = %source,
                dap_version = %entry.dap_version(),
                generation = entry.generation().as_str(),
                properties = entry.properties().len(),
                bintypes = entry.bintypes().len(),
                templates = entry.templates().len(),
                bitmasks = entry.bitmasks().len(),
                "registered datamodel version"
            );
            if let Some(replaced) = by_version.insert(entry.dap_version().clone(), entry) {
                debug!(
                    dap_version = %replaced.dap_version(),
                    source = %source,
                    "catalog overrides earlier definition"
                );
            }
        }

        let mut entries: Vec<VersionEntry> = by_version.into_values().collect();
        entries.sort_by(|a, b| a.dap_version().chronological_cmp(b.dap_version()));
        validate_generation_order(&entries)?;

        let mut releases = Vec::new();
        let mut release_entry = Vec::new();
        let mut by_release = BTreeMap::new();
        let mut by_drp = BTreeMap::new();
        let mut by_dap = BTreeMap::new();
        for (entry_idx, entry) in entries.iter().enumerate() {
            by_dap.insert(entry.dap_version().as_str().to_string(), entry_idx);
            for release in entry.releases() {
                let release_idx = releases.len();
                if by_release.insert(release.name.clone(), release_idx).is_some() {
                    bail!("release {} is defined by more than one catalog", release.name);
                }
                // Unique drp versions also make (drp, dap) pairs unique.
                if let Some(previous) = by_drp.insert(release.drp_version.clone(), release_idx) {
                    let previous: &ReleaseInfo = &releases[previous];
                    bail!(
                        "drp version {} is shared by releases {} and {}",
                        release.drp_version,
                        previous.name,
                        release.name
                    );
                }
                releases.push(release.clone());
                release_entry.push(entry_idx);
            }
        }

        // `lookup` tries DAP versions first, so a drp spelling that parses as a
        // registered DAP version would be unreachable.
        for release in &releases {
            for spelling in drp_version_spellings(&release.drp_version) {
                if let Some(dap) = DapVersion::parse(spelling) {
                    if by_dap.contains_key(dap.as_str()) {
                        bail!(
                            "drp version {spelling} of release {} reads as DAP version {dap}",
                            release.name
                        );
                    }
                }
            }
        }

        let current = match &self.default_release {
            Some(default) => match by_release.get(default) {
                Some(&release_idx) => release_entry[release_idx],
                None => bail!(
                    "default release {default} is not defined; known releases: {}",
                    releases
                        .iter()
                        .map(|r| r.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            },
            None => entries.len() - 1,
        };

        debug!(
            versions = entries.len(),
            releases = releases.len(),
            default_release = self.default_release.as_deref().unwrap_or("<newest>"),
            "datamodel registry built"
        );

        Ok(DataModelRegistry {
            entries,
            releases,
            release_entry,
            by_release,
            by_drp,
            by_dap,
            default_release: self.default_release,
            current,
        })
    }
}

fn json_files_in(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let path = entry
            .with_context(|| format!("reading {}", dir.display()))?
            .path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn validate_generation_order(entries: &[VersionEntry]) -> anyhow::Result<()> {
    let first_modern = entries
        .iter()
        .find(|entry| entry.generation() == Generation::Modern);
    let last_legacy = entries
        .iter()
        .rev()
        .find(|entry| entry.generation() == Generation::Legacy);
    if let (Some(modern), Some(legacy)) = (first_modern, last_legacy) {
        if legacy
            .dap_version()
            .chronological_cmp(modern.dap_version())
            .is_gt()
        {
            bail!(
                "legacy version {} sorts after modern version {}",
                legacy.dap_version(),
                modern.dap_version()
            );
        }
    }
    Ok(())
}

#[derive(Debug)]
/// Frozen table of releases and per-version catalogs.
pub struct DataModelRegistry {
    entries: Vec<VersionEntry>,
    releases: Vec<ReleaseInfo>,
    // Entry index for each release row.
    release_entry: Vec<usize>,
    by_release: BTreeMap<String, usize>,
    by_drp: BTreeMap<String, usize>,
    by_dap: BTreeMap<String, usize>,
    default_release: Option<String>,
    current: usize,
}

impl DataModelRegistry {
    /// Registry built from the embedded catalogs only.
    pub fn embedded() -> anyhow::Result<Self> {
        RegistryBuilder::new().with_embedded()?.build()
    }

    /// Resolve a release name, DAP version or drp version to its entry.
    ///
    /// Keys are tried in that order: release (case-insensitive), DAP version
    /// (`2.0.2` or `v2_0_2`), then drp version with the historical alias
    /// applied.
    pub fn lookup(&self, key: &str) -> Result<&VersionEntry> {
        let trimmed = key.trim();
        if let Some(&idx) = self.by_release.get(&normalize_release_name(trimmed)) {
            return Ok(self.release_entry(idx));
        }
        if let Some(entry) = self.by_dap_version(trimmed) {
            return Ok(entry);
        }
        if looks_like_drp_version(trimmed) {
            if let Some(&idx) = self.by_drp.get(&normalize_drp_version(trimmed)) {
                return Ok(self.release_entry(idx));
            }
        }
        Err(DataModelError::UnknownVersion(key.to_string()))
    }

    /// Non-failing form of [`lookup`](Self::lookup).
    pub fn get(&self, key: &str) -> Option<&VersionEntry> {
        self.lookup(key).ok()
    }

    /// (drp_version, dap_version) pair for a release.
    pub fn versions(&self, release: &str) -> Result<&ReleaseInfo> {
        self.by_release
            .get(&normalize_release_name(release))
            .map(|&idx| &self.releases[idx])
            .ok_or_else(|| DataModelError::UnknownVersion(release.to_string()))
    }

    /// Release produced with a drp version (`v1_5_0` resolves as `v1_5_1`).
    pub fn release_for_drp_version(&self, drp_version: &str) -> Result<&ReleaseInfo> {
        self.by_drp
            .get(&normalize_drp_version(drp_version))
            .map(|&idx| &self.releases[idx])
            .ok_or_else(|| DataModelError::UnknownVersion(drp_version.to_string()))
    }

    /// Every release, oldest DAP version first.
    pub fn releases(&self) -> &[ReleaseInfo] {
        &self.releases
    }

    /// Registered DAP versions in ascending order.
    pub fn dap_versions(&self) -> impl Iterator<Item = &DapVersion> {
        self.entries.iter().map(VersionEntry::dap_version)
    }

    /// Registered entries in ascending DAP version order.
    pub fn entries(&self) -> impl Iterator<Item = &VersionEntry> {
        self.entries.iter()
    }

    /// True when `dap_version` belongs to the legacy generation. Unknown
    /// versions are not legacy.
    pub fn is_legacy(&self, dap_version: &str) -> bool {
        self.by_dap_version(dap_version)
            .is_some_and(VersionEntry::is_legacy)
    }

    /// Configured default release, if any.
    pub fn default_release(&self) -> Option<&str> {
        self.default_release.as_deref()
    }

    /// Entry for the configured default release, else the newest version.
    pub fn current(&self) -> &VersionEntry {
        &self.entries[self.current]
    }

    /// Check versions recorded in a product header against a release.
    ///
    /// Legacy products carry no DAP version; modern products must carry the
    /// release's DAP version.
    pub fn check_header_versions(
        &self,
        release: &str,
        header_drp: &str,
        header_dap: Option<&str>,
    ) -> Result<()> {
        let release_idx = *self
            .by_release
            .get(&normalize_release_name(release))
            .ok_or_else(|| DataModelError::UnknownVersion(release.to_string()))?;
        let info = &self.releases[release_idx];
        let found_drp = normalize_drp_version(header_drp);
        if found_drp != info.drp_version {
            return Err(DataModelError::VersionMismatch {
                field: "drp_version",
                expected: info.drp_version.clone(),
                found: header_drp.trim().to_string(),
            });
        }

        let entry = self.release_entry(release_idx);
        match (entry.is_legacy(), header_dap) {
            (true, None) => Ok(()),
            (true, Some(found)) => Err(DataModelError::VersionMismatch {
                field: "dap_version",
                expected: "none".to_string(),
                found: found.trim().to_string(),
            }),
            (false, None) => Err(DataModelError::VersionMismatch {
                field: "dap_version",
                expected: info.dap_version.to_string(),
                found: "none".to_string(),
            }),
            (false, Some(found)) => {
                if DapVersion::parse(found).as_ref() == Some(&info.dap_version) {
                    Ok(())
                } else {
                    Err(DataModelError::VersionMismatch {
                        field: "dap_version",
                        expected: info.dap_version.to_string(),
                        found: found.trim().to_string(),
                    })
                }
            }
        }
    }

    fn by_dap_version(&self, raw: &str) -> Option<&VersionEntry> {
        let version = DapVersion::parse(raw)?;
        self.by_dap
            .get(version.as_str())
            .map(|&idx| &self.entries[idx])
    }

    fn release_entry(&self, release_idx: usize) -> &VersionEntry {
        &self.entries[self.release_entry[release_idx]]
    }
}

impl Index<&str> for DataModelRegistry {
    type Output = VersionEntry;

    /// # Panics
    ///
    /// Panics when `key` is unknown; use [`DataModelRegistry::lookup`] to
    /// handle that case.
    fn index(&self, key: &str) -> &VersionEntry {
        match self.lookup(key) {
            Ok(entry) => entry,
            Err(err) => panic!("{err}"),
        }
    }
}
