//! Registry configuration sourced from the environment.
//!
//! Two variables are honored:
//! - `MARVIN_RELEASE` picks the release reported by `DataModelRegistry::current`.
//! - `MARVIN_DATAMODEL_PATH` lists extra catalog files or directories,
//!   separated by commas or the platform path separator (`:` on Unix, `;` on
//!   Windows). Spaces inside an entry are kept, so paths may contain them.
//!   Directories contribute every `*.json` file they contain, in name order.
//!
//! Embedded catalogs are always part of the registry; extra catalogs are
//! layered on top of them.

use std::env;
use std::path::PathBuf;

pub const RELEASE_ENV: &str = "MARVIN_RELEASE";
pub const DATAMODEL_PATH_ENV: &str = "MARVIN_DATAMODEL_PATH";

#[derive(Clone, Debug, PartialEq, Eq)]
/// Inputs for building a `DataModelRegistry`.
pub struct RegistryConfig {
    pub default_release: Option<String>,
    pub catalog_paths: Vec<PathBuf>,
    pub include_embedded: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            default_release: None,
            catalog_paths: Vec::new(),
            include_embedded: true,
        }
    }
}

impl RegistryConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let default_release = lookup(RELEASE_ENV)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        let catalog_paths = lookup(DATAMODEL_PATH_ENV)
            .map(|value| split_path_list(&value))
            .unwrap_or_default();
        Self {
            default_release,
            catalog_paths,
            include_embedded: true,
        }
    }
}

/// Split a path list on commas and the platform path separator. Entries are
/// trimmed at both ends and empty entries dropped.
pub fn split_path_list(value: &str) -> Vec<PathBuf> {
    value
        .split(',')
        .flat_map(env::split_paths)
        .map(|path| path.to_str().map(|s| PathBuf::from(s.trim())).unwrap_or(path))
        .filter(|path| !path.as_os_str().is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn path_list_splits_on_commas_only_within_an_entry() {
        assert_eq!(
            split_path_list("a.json, My Catalogs/b.json ,,"),
            vec![PathBuf::from("a.json"), PathBuf::from("My Catalogs/b.json")]
        );
        assert!(split_path_list("  ").is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn path_list_accepts_the_platform_separator() {
        assert_eq!(
            split_path_list("/data/dap catalogs:/tmp/extra.json,/opt/x"),
            vec![
                PathBuf::from("/data/dap catalogs"),
                PathBuf::from("/tmp/extra.json"),
                PathBuf::from("/opt/x"),
            ]
        );
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = RegistryConfig::from_lookup(lookup_from(&[]));
        assert_eq!(config, RegistryConfig::default());
        assert!(config.include_embedded);
    }

    #[test]
    fn reads_release_and_paths() {
        let config = RegistryConfig::from_lookup(lookup_from(&[
            (RELEASE_ENV, " MPL-5 "),
            (DATAMODEL_PATH_ENV, "/tmp/a.json, /tmp/dap catalogs"),
        ]));
        assert_eq!(config.default_release.as_deref(), Some("MPL-5"));
        assert_eq!(
            config.catalog_paths,
            vec![PathBuf::from("/tmp/a.json"), PathBuf::from("/tmp/dap catalogs")]
        );
    }

    #[test]
    fn blank_release_is_ignored() {
        let config = RegistryConfig::from_lookup(lookup_from(&[(RELEASE_ENV, "   ")]));
        assert_eq!(config.default_release, None);
    }
}
