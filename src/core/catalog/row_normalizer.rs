// Row normalizer - turns raw sheet rows into `Item`s.
//
// Every transform in here is total: a malformed cell falls back to a safe
// default (0, "", or the raw text) so one bad row can never abort the catalog.
// The pure cell transforms are free functions so they can be tested without a
// column map; `RowNormalizer` only decides which cell feeds which transform.

use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use regex::Regex;

use super::catalog_models::{Item, ItemDetails, Oem, Price, StockLocation, Terminal};
use super::column_map::ColumnMap;
use crate::core::images::ImageReferenceResolver;

// ============================================================================
// CELL TRANSFORMS
// ============================================================================

/// Trimmed cell at `index`, or "" when the row is shorter than that.
pub fn cell(row: &[String], index: usize) -> &str {
    row.get(index).map(|value| value.trim()).unwrap_or("")
}

fn optional_cell(row: &[String], index: Option<usize>) -> &str {
    index.map(|i| cell(row, i)).unwrap_or("")
}

static GROUPED_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^-?\d{1,3}(?:,\d{3})+(?:\.\d+)?$").expect("valid grouped number regex")
});

/// Parses a cell as a finite number. Sheets renders formatted numbers with
/// thousands separators ("1,200"), so those are accepted too.
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let value = if GROUPED_NUMBER.is_match(trimmed) {
        trimmed.replace(',', "").parse::<f64>()
    } else {
        trimmed.parse::<f64>()
    };
    value.ok().filter(|v| v.is_finite())
}

/// Stock quantity. Anything that isn't a finite number is 0; fractions
/// truncate toward zero and negatives clamp to 0.
pub fn parse_quantity(raw: &str) -> u32 {
    parse_number(raw)
        .map(|value| value.trunc().max(0.0) as u32)
        .unwrap_or(0)
}

/// Joins a description split over two columns with a single space.
pub fn compose_description(first: &str, second: &str) -> String {
    [first.trim(), second.trim()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether an OEM flag cell counts as "compatible".
pub fn is_truthy_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "true" | "yes" | "y" | "x" | "1" | "✓" | "✔"
    )
}

/// Comma-and-space joined OEM labels in `Oem::all()` order, whatever order
/// the flags arrive in.
pub fn derive_vehicles(present: impl IntoIterator<Item = Oem>) -> String {
    present
        .into_iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(|oem| oem.label())
        .collect::<Vec<_>>()
        .join(", ")
}

static TERM_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"#\s*(\d+(?:\s+\d+)*)\s*-\s*(\d+(?:\s+\d+)*)").expect("valid terminal range regex")
});

/// Compacts "Terminals #1-8" to "T:1-8". Text without a `#a-b` range passes
/// through unchanged.
pub fn format_term_range(raw: &str) -> String {
    match TERM_RANGE.captures(raw) {
        Some(caps) => {
            let strip = |s: &str| s.chars().filter(|c| !c.is_whitespace()).collect::<String>();
            format!("T:{}-{}", strip(&caps[1]), strip(&caps[2]))
        }
        None => raw.to_string(),
    }
}

/// Price cell as a number when it is one (a leading `$` is tolerated),
/// otherwise the original text.
pub fn normalize_price(raw: &str) -> Price {
    let trimmed = raw.trim();
    let numeric = trimmed.strip_prefix('$').unwrap_or(trimmed).trim();

    match parse_number(numeric) {
        Some(value) => Price::Amount(value),
        None => Price::Text(raw.to_string()),
    }
}

// ============================================================================
// ROW NORMALIZER
// ============================================================================

/// Maps rows of the primary range onto `Item`s using a column map.
pub struct RowNormalizer {
    columns: ColumnMap,
    images: ImageReferenceResolver,
}

impl RowNormalizer {
    pub fn new(columns: ColumnMap, images: ImageReferenceResolver) -> Self {
        Self { columns, images }
    }

    pub fn columns(&self) -> &ColumnMap {
        &self.columns
    }

    /// Spacer rows have every significant field empty. Everything else is
    /// kept, however sparse.
    pub fn is_spacer(&self, row: &[String]) -> bool {
        let c = &self.columns;
        [
            c.part_number,
            c.description,
            c.location_a,
            c.location_b,
            c.pin_count,
            c.category,
        ]
        .into_iter()
        .all(|index| cell(row, index).is_empty())
    }

    /// Normalizes every non-spacer row, keeping sheet order.
    pub fn normalize(&self, rows: &[Vec<String>]) -> Vec<Item> {
        let items: Vec<Item> = rows
            .iter()
            .filter(|row| !self.is_spacer(row))
            .map(|row| self.normalize_row(row))
            .collect();

        tracing::debug!(
            rows = rows.len(),
            items = items.len(),
            "Normalized inventory rows"
        );

        items
    }

    pub fn normalize_row(&self, row: &[String]) -> Item {
        let c = &self.columns;

        let oem_cells: Vec<(Oem, &str)> = c
            .oem
            .columns()
            .into_iter()
            .map(|(oem, index)| (oem, cell(row, index)))
            .collect();

        let vehicles = derive_vehicles(
            oem_cells
                .iter()
                .filter(|(_, raw)| is_truthy_flag(raw))
                .map(|(oem, _)| *oem),
        );

        let oem_flags: BTreeMap<String, String> = oem_cells
            .iter()
            .map(|(oem, raw)| (oem.label().to_string(), raw.to_string()))
            .collect();

        Item {
            part_number: cell(row, c.part_number).to_string(),
            description: compose_description(
                cell(row, c.description),
                optional_cell(row, c.description_extra),
            ),
            alt_number: cell(row, c.alt_number).to_string(),
            locations: [
                StockLocation {
                    label: c.location_a_label.clone(),
                    quantity: parse_quantity(cell(row, c.location_a)),
                },
                StockLocation {
                    label: c.location_b_label.clone(),
                    quantity: parse_quantity(cell(row, c.location_b)),
                },
            ],
            pin_count: cell(row, c.pin_count).to_string(),
            category: cell(row, c.category).to_string(),
            gender: cell(row, c.gender).to_string(),
            manufacturer: cell(row, c.manufacturer).to_string(),
            vehicles,
            picture: self.images.resolve(cell(row, c.picture)),
            details: ItemDetails {
                terminal1: Terminal {
                    code: optional_cell(row, c.terminal_1_code).to_string(),
                    range: format_term_range(optional_cell(row, c.terminal_1_range)),
                },
                terminal2: Terminal {
                    code: optional_cell(row, c.terminal_2_code).to_string(),
                    range: format_term_range(optional_cell(row, c.terminal_2_range)),
                },
                mating_part: optional_cell(row, c.mating_part).to_string(),
                price: normalize_price(optional_cell(row, c.price)),
                oem_flags,
            },
        }
    }
}
