//! Directory-based action discovery.
//!
//! Each `*.yaml` / `*.yml` file in the directory is one manifest binding a
//! name to a built-in action kind:
//!
//! ```yaml
//! name: hub_Befriend
//! kind: trust
//! client: ringshub
//! ```
//!
//! Files are visited in name order. A manifest that cannot be read or
//! parsed is skipped with a warning; a name clash is fatal.

use log::{info, warn};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use super::{ActionDescriptor, ActionRegistryBuilder, RegistryError, RINGSHUB_CLIENT};
use crate::actions::ActionKind;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ActionManifest {
    name: String,
    kind: ActionKind,
    #[serde(default = "default_client")]
    client: String,
}

fn default_client() -> String {
    RINGSHUB_CLIENT.to_string()
}

fn is_manifest(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == "yaml" || ext == "yml")
}

fn load_manifest(path: &Path) -> Result<ActionDescriptor, String> {
    let content = fs::read_to_string(path).map_err(|e| e.to_string())?;
    let manifest: ActionManifest = serde_yaml::from_str(&content).map_err(|e| e.to_string())?;
    if manifest.name.trim().is_empty() {
        return Err("manifest name cannot be empty".to_string());
    }
    Ok(ActionDescriptor::new(manifest.name, manifest.kind, manifest.client))
}

impl ActionRegistryBuilder {
    /// Register every action manifest found in `dir`.
    ///
    /// # Returns
    ///
    /// * The number of actions registered from `dir`
    pub fn discover(&mut self, dir: &Path) -> Result<usize, RegistryError> {
        let entries = fs::read_dir(dir).map_err(|source| RegistryError::Discovery {
            path: dir.to_path_buf(),
            source,
        })?;
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| is_manifest(path))
            .collect();
        paths.sort();

        let mut registered = 0;
        for path in paths {
            match load_manifest(&path) {
                Ok(descriptor) => {
                    self.register(descriptor)?;
                    registered += 1;
                }
                Err(e) => warn!("Skipping action manifest {:?}: {}", path, e),
            }
        }
        info!("Discovered {} actions in {:?}", registered, dir);
        Ok(registered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_discover_skips_broken_manifests() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a_befriend.yaml"), "name: hub_Befriend\nkind: trust\n").unwrap();
        fs::write(dir.path().join("b_broken.yaml"), "name: [unterminated").unwrap();
        fs::write(dir.path().join("c_unknown_kind.yml"), "name: hub_Burn\nkind: burn\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "not a manifest").unwrap();

        let mut builder = ActionRegistryBuilder::new();
        assert_eq!(builder.discover(dir.path()).unwrap(), 1);

        let registry = builder.build();
        let descriptor = registry.resolve("hub_Befriend").unwrap();
        assert_eq!(descriptor.kind, ActionKind::Trust);
        assert_eq!(descriptor.client, RINGSHUB_CLIENT);
    }

    #[test]
    fn test_discover_rejects_duplicate_names() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("mint.yaml"), "name: ringshub_PersonalMint\nkind: personal_mint\n").unwrap();

        let mut builder = ActionRegistryBuilder::new().with_builtin_actions();
        assert!(matches!(builder.discover(dir.path()), Err(RegistryError::DuplicateAction(_))));
    }

    #[test]
    fn test_missing_directory_fails() {
        let dir = tempdir().unwrap();
        let mut builder = ActionRegistryBuilder::new();
        assert!(matches!(
            builder.discover(&dir.path().join("missing")),
            Err(RegistryError::Discovery { .. })
        ));
    }
}
