// Column map - which sheet column feeds which Item field.
//
// The inventory sheet has no header binding; a field is identified only by its
// zero-based position. The layout drifts whenever someone edits the sheet, so
// the positions live in a versioned TOML record instead of being scattered
// through the normalizer as constants.
//
// Example `column_map.toml`:
//
// ```toml
// version = 1
// part_number = 0
// description = 1
// description_extra = 2
// location_a = 4
// location_a_label = "Warehouse"
//
// [oem]
// ford = 9
// nissan = 12
// ```
//
// Omitted keys keep their default position. OEM flag columns are the exception:
// a file that has an `[oem]` table only gets the OEMs listed in it.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use super::catalog_models::Oem;

/// The only layout version this build understands.
pub const COLUMN_MAP_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ColumnMapError {
    #[error("Failed to read column map {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid column map: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Unsupported column map version {found} (expected {})", COLUMN_MAP_VERSION)]
    UnsupportedVersion { found: u32 },
    #[error("Column map field '{field}' points at column {index}, but the fetched range is only {width} columns wide")]
    OutOfBounds {
        field: &'static str,
        index: usize,
        width: usize,
    },
}

/// Optional per-OEM flag columns. An `[oem]` table in the TOML replaces the
/// default set wholesale, so OEMs it leaves out have no column.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OemColumns {
    pub ford: Option<usize>,
    pub gm: Option<usize>,
    pub hyundai_kia: Option<usize>,
    pub nissan: Option<usize>,
    pub toyota: Option<usize>,
}

impl OemColumns {
    /// Configured flag columns in `Oem::all()` order. Unconfigured OEMs are skipped.
    pub fn columns(&self) -> Vec<(Oem, usize)> {
        Oem::all()
            .into_iter()
            .filter_map(|oem| self.index_for(oem).map(|index| (oem, index)))
            .collect()
    }

    fn index_for(&self, oem: Oem) -> Option<usize> {
        match oem {
            Oem::Ford => self.ford,
            Oem::Gm => self.gm,
            Oem::HyundaiKia => self.hyundai_kia,
            Oem::Nissan => self.nissan,
            Oem::Toyota => self.toyota,
        }
    }
}

impl Default for OemColumns {
    fn default() -> Self {
        Self {
            ford: Some(9),
            gm: Some(10),
            hyundai_kia: Some(11),
            nissan: Some(12),
            toyota: Some(13),
        }
    }
}

/// Positional layout of the primary inventory range.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ColumnMap {
    pub version: u32,

    pub part_number: usize,
    pub description: usize,
    /// Second half of a description split over two columns.
    pub description_extra: Option<usize>,
    pub alt_number: usize,

    pub location_a: usize,
    pub location_a_label: String,
    pub location_b: usize,
    pub location_b_label: String,

    pub pin_count: usize,
    pub category: usize,
    pub gender: usize,
    pub manufacturer: usize,

    pub oem: OemColumns,

    pub picture: usize,

    pub terminal_1_code: Option<usize>,
    pub terminal_1_range: Option<usize>,
    pub terminal_2_code: Option<usize>,
    pub terminal_2_range: Option<usize>,
    pub mating_part: Option<usize>,
    pub price: Option<usize>,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            version: COLUMN_MAP_VERSION,
            part_number: 0,
            description: 1,
            description_extra: None,
            alt_number: 2,
            location_a: 3,
            location_a_label: "Warehouse".to_string(),
            location_b: 4,
            location_b_label: "Truck".to_string(),
            pin_count: 5,
            category: 6,
            gender: 7,
            manufacturer: 8,
            oem: OemColumns::default(),
            picture: 14,
            terminal_1_code: Some(15),
            terminal_1_range: Some(16),
            terminal_2_code: Some(17),
            terminal_2_range: Some(18),
            mating_part: Some(19),
            price: Some(20),
        }
    }
}

impl ColumnMap {
    /// Parses a TOML layout and checks its version.
    pub fn from_toml(content: &str) -> Result<Self, ColumnMapError> {
        let map: ColumnMap = toml::from_str(content)?;
        if map.version != COLUMN_MAP_VERSION {
            return Err(ColumnMapError::UnsupportedVersion { found: map.version });
        }
        Ok(map)
    }

    /// Reads a TOML layout from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ColumnMapError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ColumnMapError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Every configured column, named after the field it feeds.
    pub fn referenced_columns(&self) -> Vec<(&'static str, usize)> {
        let mut columns = vec![
            ("part_number", self.part_number),
            ("description", self.description),
            ("alt_number", self.alt_number),
            ("location_a", self.location_a),
            ("location_b", self.location_b),
            ("pin_count", self.pin_count),
            ("category", self.category),
            ("gender", self.gender),
            ("manufacturer", self.manufacturer),
            ("picture", self.picture),
        ];

        let optional = [
            ("description_extra", self.description_extra),
            ("oem.ford", self.oem.ford),
            ("oem.gm", self.oem.gm),
            ("oem.hyundai_kia", self.oem.hyundai_kia),
            ("oem.nissan", self.oem.nissan),
            ("oem.toyota", self.oem.toyota),
            ("terminal_1_code", self.terminal_1_code),
            ("terminal_1_range", self.terminal_1_range),
            ("terminal_2_code", self.terminal_2_code),
            ("terminal_2_range", self.terminal_2_range),
            ("mating_part", self.mating_part),
            ("price", self.price),
        ];
        columns.extend(
            optional
                .into_iter()
                .filter_map(|(field, index)| index.map(|i| (field, i))),
        );

        columns
    }

    /// Fails if any configured column lies outside a range `width` columns wide.
    pub fn validate_width(&self, width: usize) -> Result<(), ColumnMapError> {
        match self
            .referenced_columns()
            .into_iter()
            .find(|(_, index)| *index >= width)
        {
            Some((field, index)) => Err(ColumnMapError::OutOfBounds {
                field,
                index,
                width,
            }),
            None => Ok(()),
        }
    }
}
