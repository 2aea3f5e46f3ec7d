//! # Marker catalog
//!
//! Static table of the fiducial markers the beacon knows about, loaded from
//! `marker_catalog.toml`:
//!
//! ```toml
//! [[markers]]
//! id = 13
//! true_size = 14.4
//! side = 1
//! weight = 1.0
//! shift = { x = -20.0, y = 30.0, angle_deg = 90.0 }
//! ```
//!
//! Markers with a negative `side` are fixed to the field and only used as a pan angle reference,
//! in which case `shift.angle_deg` is the bearing the marker should be seen at from the camera.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use util::params::{self, LoadError};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Largest marker ID accepted in the catalog, bounds the size of the per-ID tables.
pub const MAX_MARKER_ID: usize = 1023;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Expected offset of a marker from the robot's logical frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Shift {
    /// Offset along the robot's forward axis.
    ///
    /// Units: centimeters
    pub x: f64,

    /// Offset along the robot's right axis.
    ///
    /// Units: centimeters
    pub y: f64,

    /// Yaw of the marker's X axis relative to the robot's forward axis, or for a reference marker
    /// the expected bearing of the marker from the camera.
    ///
    /// Units: degrees
    pub angle_deg: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkerCatalogEntry {
    pub id: usize,

    /// Physical size of the marker, scales the detector's unit-size pose into centimeters. Zero or
    /// negative for an unknown marker.
    pub true_size: f64,

    /// Which side of the robot the marker is on, negative for a field-fixed reference marker
    #[serde(default)]
    pub side: i32,

    /// Trust weight of the marker in the fused pose
    #[serde(default = "default_weight")]
    pub weight: f64,

    #[serde(default)]
    pub shift: Shift,
}

/// All known markers, indexed by ID.
#[derive(Debug, Clone, Default)]
pub struct MarkerCatalog {
    entries: Vec<MarkerCatalogEntry>,
}

#[derive(Deserialize)]
struct CatalogFile {
    #[serde(default)]
    markers: Vec<MarkerCatalogEntry>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Could not load the marker catalog: {0}")]
    LoadError(LoadError),

    #[error("Marker {0} appears more than once in the catalog")]
    DuplicateId(usize),

    #[error("Marker ID {0} is larger than the maximum of {max}", max = MAX_MARKER_ID)]
    IdTooLarge(usize),

    #[error("Marker {0} has an invalid weight ({1}), weights must be finite and non-negative")]
    InvalidWeight(usize, f64),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MarkerCatalogEntry {
    /// The entry used for any ID not in the catalog.
    pub fn unknown(id: usize) -> Self {
        Self {
            id,
            true_size: -1.0,
            side: 0,
            weight: 0.0,
            shift: Shift::default(),
        }
    }

    pub fn is_known(&self) -> bool {
        self.true_size > 0.0
    }

    /// If the marker is fixed to the field and only provides a pan angle reference.
    pub fn is_reference(&self) -> bool {
        self.side < 0
    }
}

impl MarkerCatalog {
    /// Load the catalog from a file under the parameters directory.
    pub fn load(param_file_path: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile =
            params::load(param_file_path).map_err(CatalogError::LoadError)?;
        Self::from_entries(file.markers)
    }

    /// Parse the catalog from a TOML string.
    pub fn from_toml(s: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = params::from_str(s).map_err(CatalogError::LoadError)?;
        Self::from_entries(file.markers)
    }

    pub fn from_entries<I>(entries: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = MarkerCatalogEntry>,
    {
        let mut table: Vec<MarkerCatalogEntry> = Vec::new();

        for e in entries {
            if e.id > MAX_MARKER_ID {
                return Err(CatalogError::IdTooLarge(e.id));
            }
            if !e.weight.is_finite() || e.weight < 0.0 {
                return Err(CatalogError::InvalidWeight(e.id, e.weight));
            }

            if table.len() <= e.id {
                let start = table.len();
                table.extend((start..=e.id).map(MarkerCatalogEntry::unknown));
            }

            if table[e.id].is_known() {
                return Err(CatalogError::DuplicateId(e.id));
            }
            table[e.id] = e;
        }

        Ok(Self { entries: table })
    }

    /// Get the entry for the given ID. IDs outside the table give an unknown entry.
    pub fn get(&self, id: usize) -> MarkerCatalogEntry {
        self.entries
            .get(id)
            .copied()
            .unwrap_or_else(|| MarkerCatalogEntry::unknown(id))
    }

    /// Number of ID slots in the catalog (the largest ID plus one).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterator over the known entries.
    pub fn known(&self) -> impl Iterator<Item = &MarkerCatalogEntry> {
        self.entries.iter().filter(|e| e.is_known())
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn default_weight() -> f64 {
    1.0
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    const CATALOG: &str = r#"
        [[markers]]
        id = 3
        true_size = 14.4
        side = 1
        weight = 2.0
        shift = { x = -20.0, y = 30.0, angle_deg = 90.0 }

        [[markers]]
        id = 7
        true_size = 8.0
        side = -1
        shift = { angle_deg = 45.0 }

        [[markers]]
        id = 5
        true_size = 0.0
    "#;

    #[test]
    fn test_load() {
        let cat = MarkerCatalog::from_toml(CATALOG).unwrap();

        assert_eq!(cat.len(), 8);
        assert_eq!(cat.known().count(), 2);

        let m3 = cat.get(3);
        assert!(m3.is_known());
        assert!(!m3.is_reference());
        assert_eq!(m3.weight, 2.0);
        assert_eq!(m3.shift.y, 30.0);

        let m7 = cat.get(7);
        assert!(m7.is_reference());
        assert_eq!(m7.weight, 1.0);
        assert_eq!(m7.shift.angle_deg, 45.0);

        // Zero size, holes and IDs past the end are all unknown
        assert!(!cat.get(5).is_known());
        assert!(!cat.get(0).is_known());
        assert!(!cat.get(500).is_known());
        assert_eq!(cat.get(500).id, 500);
    }

    #[test]
    fn test_invalid() {
        let dup = vec![
            MarkerCatalogEntry { true_size: 1.0, ..MarkerCatalogEntry::unknown(2) },
            MarkerCatalogEntry { true_size: 1.0, ..MarkerCatalogEntry::unknown(2) },
        ];
        match MarkerCatalog::from_entries(dup) {
            Err(CatalogError::DuplicateId(2)) => (),
            other => panic!("Expected a duplicate ID error, got {:?}", other),
        }

        let neg = vec![MarkerCatalogEntry {
            true_size: 1.0,
            weight: -1.0,
            ..MarkerCatalogEntry::unknown(1)
        }];
        assert!(MarkerCatalog::from_entries(neg).is_err());

        let big = vec![MarkerCatalogEntry::unknown(MAX_MARKER_ID + 1)];
        assert!(MarkerCatalog::from_entries(big).is_err());
    }
}
