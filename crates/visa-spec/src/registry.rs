use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use globset::Glob;
use thiserror::Error;
use tracing::debug;

use crate::spec::form::{BundleError, FormBundle};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("form '{country}/{form_id}' is registered twice")]
    Duplicate { country: String, form_id: String },
    #[error("form '{key}' is invalid: {source}")]
    InvalidBundle {
        key: String,
        #[source]
        source: BundleError,
    },
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid form pattern: {0}")]
    Pattern(#[from] globset::Error),
}

type Key = (String, String);

fn key(country: &str, form_id: &str) -> Key {
    (country.trim().to_ascii_lowercase(), form_id.trim().to_string())
}

/// Collects bundles before the registry is frozen.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    bundles: BTreeMap<Key, FormBundle>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a checked bundle. Its country code is stored lowercased.
    pub fn register(mut self, mut bundle: FormBundle) -> Result<Self, RegistryError> {
        let key = key(&bundle.country, &bundle.id);
        bundle.check().map_err(|source| RegistryError::InvalidBundle {
            key: format!("{}/{}", key.0, key.1),
            source,
        })?;
        if self.bundles.contains_key(&key) {
            return Err(RegistryError::Duplicate {
                country: key.0,
                form_id: key.1,
            });
        }
        debug!(
            country = %key.0,
            form_id = %key.1,
            fields = bundle.fields.len(),
            "registered form bundle"
        );
        bundle.country.clone_from(&key.0);
        self.bundles.insert(key, bundle);
        Ok(self)
    }

    /// Registers every `*.json` bundle in `dir`, in file name order.
    pub fn load_dir(mut self, dir: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let dir = dir.as_ref();
        let io_error = |source| RegistryError::Io {
            path: dir.to_path_buf(),
            source,
        };
        let mut paths = fs::read_dir(dir)
            .map_err(io_error)?
            .map(|entry| entry.map(|entry| entry.path()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(io_error)?;
        paths.retain(|path| path.extension().is_some_and(|ext| ext == "json"));
        paths.sort();

        for path in paths {
            self = self.register(load_bundle(&path)?)?;
        }
        Ok(self)
    }

    pub fn build(self) -> FormRegistry {
        FormRegistry {
            bundles: self.bundles,
        }
    }
}

pub fn load_bundle(path: &Path) -> Result<FormBundle, RegistryError> {
    let raw = fs::read_to_string(path).map_err(|source| RegistryError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| RegistryError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Immutable lookup of form bundles by country code and form id.
#[derive(Debug, Clone, Default)]
pub struct FormRegistry {
    bundles: BTreeMap<Key, FormBundle>,
}

impl FormRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Country codes are matched case-insensitively.
    pub fn get(&self, country: &str, form_id: &str) -> Option<&FormBundle> {
        self.bundles.get(&key(country, form_id))
    }

    pub fn list(&self) -> impl Iterator<Item = &FormBundle> {
        self.bundles.values()
    }

    /// Bundles whose `country/form-id` matches a glob such as `ca/*`.
    pub fn matching(&self, pattern: &str) -> Result<Vec<&FormBundle>, RegistryError> {
        let matcher = Glob::new(&pattern.to_ascii_lowercase())?.compile_matcher();
        Ok(self
            .bundles
            .iter()
            .filter(|((country, form_id), _)| {
                matcher.is_match(format!("{}/{}", country, form_id.to_ascii_lowercase()))
            })
            .map(|(_, bundle)| bundle)
            .collect())
    }

    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::field::{FieldSpec, FieldType};

    fn bundle(country: &str, id: &str) -> FormBundle {
        FormBundle {
            country: country.into(),
            id: id.into(),
            title: format!("{} {}", country, id),
            version: "1".into(),
            description: None,
            steps: vec![],
            fields: vec![FieldSpec::new("name", "identity", FieldType::Text)],
            documents: vec![],
        }
    }

    #[test]
    fn lookup_is_case_insensitive_on_country() {
        let registry = FormRegistry::builder()
            .register(bundle("CA", "visitor"))
            .expect("register")
            .build();
        assert!(registry.get("ca", "visitor").is_some());
        assert!(registry.get("Ca", "visitor").is_some());
        assert!(registry.get("ca", "study").is_none());
        assert!(registry.get("us", "visitor").is_none());
    }

    #[test]
    fn registered_country_is_lowercased() {
        let registry = FormRegistry::builder()
            .register(bundle(" CA", "visitor"))
            .expect("register")
            .build();
        let stored = registry.get("ca", "visitor").expect("bundle");
        assert_eq!(stored.country, "ca");
    }

    #[test]
    fn duplicates_are_rejected() {
        let result = FormRegistry::builder()
            .register(bundle("ca", "visitor"))
            .and_then(|builder| builder.register(bundle("CA", "visitor")));
        assert!(matches!(result, Err(RegistryError::Duplicate { .. })));
    }

    #[test]
    fn invalid_bundles_are_rejected() {
        let mut broken = bundle("ca", "visitor");
        broken
            .fields
            .push(FieldSpec::new("name", "identity", FieldType::Text));
        assert!(matches!(
            FormRegistry::builder().register(broken),
            Err(RegistryError::InvalidBundle { .. })
        ));
    }

    #[test]
    fn matching_filters_by_glob() {
        let registry = FormRegistry::builder()
            .register(bundle("ca", "visitor"))
            .and_then(|builder| builder.register(bundle("ca", "study")))
            .and_then(|builder| builder.register(bundle("au", "visitor")))
            .expect("register")
            .build();

        let canadian: Vec<_> = registry
            .matching("ca/*")
            .expect("pattern")
            .into_iter()
            .map(|bundle| bundle.id.as_str())
            .collect();
        assert_eq!(canadian, vec!["study", "visitor"]);
        assert_eq!(registry.matching("*/visitor").expect("pattern").len(), 2);
        assert!(registry.matching("[").is_err());
    }

    #[test]
    fn load_dir_reads_json_bundles() {
        let dir = tempfile::tempdir().expect("tempdir");
        let spec = serde_json::to_string(&bundle("nz", "visitor")).expect("json");
        fs::write(dir.path().join("nz.json"), spec).expect("write");
        fs::write(dir.path().join("notes.txt"), "ignored").expect("write");

        let registry = FormRegistry::builder()
            .load_dir(dir.path())
            .expect("load")
            .build();
        assert_eq!(registry.len(), 1);
        assert!(registry.get("NZ", "visitor").is_some());
    }
}
