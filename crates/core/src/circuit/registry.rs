//! Resolution of circuit artifacts on disk
//!
//! For each slot the registry walks the search path (the circuit's base
//! directory, then every auxiliary directory in order) and, within each
//! directory, tries the primary filename before the alternates. The first
//! regular file found wins. Probing only reads the filesystem and nothing is
//! cached, so two resolutions differ only if the files changed in between.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::circuit::descriptor::{ArtifactSlot, CircuitDescriptor, CircuitId};
use crate::config::PermisConfig;
use crate::error::{PermisError, Result};

/// Where one artifact slot resolved to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ArtifactLocation {
    Resolved(PathBuf),
    Missing,
}

/// Resolved paths for a circuit's four artifact slots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBundle {
    circuit: CircuitId,
    slots: Vec<(ArtifactSlot, ArtifactLocation)>,
}

impl FileBundle {
    pub fn circuit(&self) -> CircuitId {
        self.circuit
    }

    pub fn location(&self, slot: ArtifactSlot) -> &ArtifactLocation {
        self.slots
            .iter()
            .find(|(s, _)| *s == slot)
            .map(|(_, location)| location)
            .unwrap_or(&ArtifactLocation::Missing)
    }

    /// Resolved path of a slot, if any
    pub fn path(&self, slot: ArtifactSlot) -> Option<&Path> {
        match self.location(slot) {
            ArtifactLocation::Resolved(path) => Some(path.as_path()),
            ArtifactLocation::Missing => None,
        }
    }

    /// Resolved path of a slot, or a `MissingArtifactError` naming it
    pub fn require(&self, slot: ArtifactSlot) -> Result<&Path> {
        self.path(slot).ok_or_else(|| PermisError::MissingArtifactError {
            circuit: self.circuit,
            missing: vec![slot],
        })
    }

    /// Slots that did not resolve, in slot order
    pub fn missing(&self) -> Vec<ArtifactSlot> {
        ArtifactSlot::ALL
            .iter()
            .copied()
            .filter(|slot| self.path(*slot).is_none())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }

    /// Fail with every missing slot unless the bundle is complete
    pub fn ensure_complete(&self) -> Result<()> {
        let missing = self.missing();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(PermisError::MissingArtifactError {
                circuit: self.circuit,
                missing,
            })
        }
    }

    pub fn status(&self) -> BundleStatus {
        let missing = self.missing();
        BundleStatus {
            circuit: self.circuit,
            found: ArtifactSlot::ALL.len() - missing.len(),
            required: ArtifactSlot::ALL.len(),
            missing,
        }
    }
}

/// Found/required counts and the exact missing slots
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleStatus {
    pub circuit: CircuitId,
    pub found: usize,
    pub required: usize,
    pub missing: Vec<ArtifactSlot>,
}

impl BundleStatus {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

impl fmt::Display for BundleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}/{}", self.circuit, self.found, self.required)?;
        if !self.missing.is_empty() {
            let names: Vec<&str> = self.missing.iter().map(|slot| slot.name()).collect();
            write!(f, " (missing {})", names.join(", "))?;
        }
        Ok(())
    }
}

/// Known circuits plus the directories searched for their files
#[derive(Debug, Clone)]
pub struct CircuitRegistry {
    descriptors: Vec<CircuitDescriptor>,
    auxiliary_dirs: Vec<PathBuf>,
}

impl CircuitRegistry {
    /// Registry with the built-in circuits under `config.circuits_root`
    pub fn from_config(config: &PermisConfig) -> Self {
        let descriptors = CircuitId::ALL
            .iter()
            .map(|id| CircuitDescriptor::builtin(*id, &config.circuits_root))
            .collect();
        Self::new(descriptors, config.auxiliary_dirs.clone())
    }

    pub fn new(descriptors: Vec<CircuitDescriptor>, auxiliary_dirs: Vec<PathBuf>) -> Self {
        Self {
            descriptors,
            auxiliary_dirs,
        }
    }

    pub fn descriptors(&self) -> &[CircuitDescriptor] {
        &self.descriptors
    }

    pub fn descriptor(&self, id: CircuitId) -> Result<&CircuitDescriptor> {
        self.descriptors
            .iter()
            .find(|descriptor| descriptor.id() == id)
            .ok_or_else(|| {
                PermisError::validation("circuit", format!("circuit '{}' is not registered", id))
            })
    }

    /// Search path for a descriptor: base directory, then auxiliary directories
    pub fn search_path<'a>(&'a self, descriptor: &'a CircuitDescriptor) -> Vec<&'a Path> {
        std::iter::once(descriptor.base_dir())
            .chain(self.auxiliary_dirs.iter().map(PathBuf::as_path))
            .collect()
    }

    /// Probe the filesystem for every artifact slot of `descriptor`
    pub fn resolve(&self, descriptor: &CircuitDescriptor) -> FileBundle {
        let search_path = self.search_path(descriptor);

        let slots = ArtifactSlot::ALL
            .iter()
            .map(|slot| {
                let location = probe_slot(&search_path, descriptor.candidates(*slot));
                if let ArtifactLocation::Resolved(path) = &location {
                    log::debug!("{}/{} -> {}", descriptor.id(), slot, path.display());
                } else {
                    log::debug!("{}/{} not found", descriptor.id(), slot);
                }
                (*slot, location)
            })
            .collect();

        FileBundle {
            circuit: descriptor.id(),
            slots,
        }
    }

    pub fn resolve_id(&self, id: CircuitId) -> Result<FileBundle> {
        Ok(self.resolve(self.descriptor(id)?))
    }

    /// Re-probe the circuit a bundle was resolved for
    pub fn refresh(&self, bundle: &FileBundle) -> Result<FileBundle> {
        log::debug!("Refreshing artifact bundle for {}", bundle.circuit());
        self.resolve_id(bundle.circuit())
    }

    pub fn status(&self, id: CircuitId) -> Result<BundleStatus> {
        Ok(self.resolve_id(id)?.status())
    }
}

fn probe_slot(search_path: &[&Path], candidates: &[String]) -> ArtifactLocation {
    for dir in search_path {
        for name in candidates {
            let candidate = dir.join(name);
            if candidate.is_file() {
                let absolute = std::fs::canonicalize(&candidate).unwrap_or(candidate);
                return ArtifactLocation::Resolved(absolute);
            }
        }
    }
    ArtifactLocation::Missing
}
