//! TOML configuration files
//!
//! Configuration files let users rename atomic types (`[types]`) and
//! override per-type atomic data (`[atoms]`). Files named
//! `.chemfiles.toml` or `chemfiles.toml` are picked up automatically from
//! the current directory and its ancestors; more files can be added
//! explicitly with [`add_configuration`]. Later files override earlier
//! ones, and the configuration is shared by the whole process.

use std::path::{Path, PathBuf};
use std::sync::{OnceLock, RwLock};

use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::warnings::warning;

/// File names used for automatic configuration discovery
const CONFIGURATION_FILE_NAMES: [&str; 2] = [".chemfiles.toml", "chemfiles.toml"];

/// Per-type atomic data overriding the built-in periodic table
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AtomicData {
    /// Full name of this type (e.g. "Hydrogen")
    pub full_name: Option<String>,
    /// Mass, in atomic mass units
    pub mass: Option<f64>,
    /// Charge, in units of the electron charge
    pub charge: Option<f64>,
    /// Van der Waals radius, in Angstroms
    pub vdw_radius: Option<f64>,
    /// Covalent radius, in Angstroms
    pub covalent_radius: Option<f64>,
}

#[derive(Debug, Default)]
struct Configuration {
    types: FxHashMap<String, String>,
    atoms: FxHashMap<String, AtomicData>,
}

impl Configuration {
    fn read(&mut self, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!(
                "could not read the configuration file at '{}': {}",
                path.display(),
                e
            ))
        })?;

        let data: toml::Table = toml::from_str(&content).map_err(|e| {
            Error::Configuration(format!(
                "configuration file at '{}' is invalid TOML: {}",
                path.display(),
                e
            ))
        })?;

        self.read_types(path, &data)?;
        self.read_atomic_data(path, &data)?;
        Ok(())
    }

    fn read_types(&mut self, path: &Path, data: &toml::Table) -> Result<()> {
        let Some(types) = data.get("types") else {
            return Ok(());
        };
        let types = types.as_table().ok_or_else(|| {
            Error::Configuration(format!(
                "invalid configuration file at '{}': 'types' must be a table",
                path.display()
            ))
        })?;

        for (old_name, new_name) in types {
            let new_name = new_name.as_str().ok_or_else(|| {
                Error::Configuration(format!(
                    "invalid configuration file at '{}': type for {} must be a string",
                    path.display(),
                    old_name
                ))
            })?;
            self.types.insert(old_name.clone(), new_name.to_string());
        }
        Ok(())
    }

    fn read_atomic_data(&mut self, path: &Path, data: &toml::Table) -> Result<()> {
        let Some(atoms) = data.get("atoms") else {
            return Ok(());
        };
        let atoms = atoms.as_table().ok_or_else(|| {
            Error::Configuration(format!(
                "invalid configuration file at '{}': 'atoms' must be a table",
                path.display()
            ))
        })?;

        for (atom_type, table) in atoms {
            let data: AtomicData = table.clone().try_into().map_err(|e| {
                Error::Configuration(format!(
                    "invalid configuration file at '{}': atomic data for {} is invalid: {}",
                    path.display(),
                    atom_type,
                    e
                ))
            })?;
            self.atoms.insert(atom_type.clone(), data);
        }
        Ok(())
    }
}

static CONFIGURATION: OnceLock<RwLock<Configuration>> = OnceLock::new();

fn instance() -> &'static RwLock<Configuration> {
    CONFIGURATION.get_or_init(|| {
        let mut configuration = Configuration::default();
        for path in discover_configuration_files() {
            if let Err(e) = configuration.read(&path) {
                warning("configuration", e.to_string());
            }
        }
        RwLock::new(configuration)
    })
}

/// Configuration files from the root directory down to the current
/// directory, so that files closer to the current directory override the
/// others.
fn discover_configuration_files() -> Vec<PathBuf> {
    let Ok(current) = std::env::current_dir() else {
        return Vec::new();
    };

    let mut directories: Vec<&Path> = current.ancestors().collect();
    directories.reverse();

    let mut files = Vec::new();
    for directory in directories {
        for name in CONFIGURATION_FILE_NAMES {
            let path = directory.join(name);
            if path.is_file() {
                files.push(path);
                break;
            }
        }
    }
    files
}

/// Read one more configuration file, overriding previously loaded values.
///
/// Fails with [`Error::Configuration`] if the file is missing or contains
/// invalid data.
pub fn add_configuration(path: impl AsRef<Path>) -> Result<()> {
    let mut configuration = instance().write().expect("configuration lock poisoned");
    configuration.read(path.as_ref())
}

/// Apply the configured type renames to `atom_type`, returning it
/// unchanged when no rename matches.
pub fn rename(atom_type: &str) -> String {
    let configuration = instance().read().expect("configuration lock poisoned");
    match configuration.types.get(atom_type) {
        Some(new_name) => new_name.clone(),
        None => atom_type.to_string(),
    }
}

/// Configured atomic data overrides for `atom_type`, if any
pub fn atom_data(atom_type: &str) -> Option<AtomicData> {
    let configuration = instance().read().expect("configuration lock poisoned");
    configuration.atoms.get(atom_type).cloned()
}
