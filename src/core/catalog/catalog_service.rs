// Catalog service - the Catalog Reader's business logic.
//
// One batched read from the sheet source, then everything else is synchronous
// and in-memory: validate the column map against the fetched width, normalize
// the primary range, build the option lists.
//
// The service doesn't know about Google or HTTP. It talks to a `SheetSource`,
// which the infra layer implements over the Sheets API and tests implement
// with canned ranges.

use async_trait::async_trait;
use thiserror::Error;

use super::catalog_models::CatalogPayload;
use super::column_map::ColumnMapError;
use super::option_extractor::{extract_options, SortPreference};
use super::row_normalizer::RowNormalizer;

// ============================================================================
// SHEET SOURCE TRAIT
// ============================================================================

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("Google authentication failed: {0}")]
    Auth(String),
    #[error("Sheets API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Sheets API request failed: {0}")]
    Transport(String),
    #[error("Unexpected Sheets API response: {0}")]
    Decode(String),
}

/// Cells of one A1 range, row-major, every cell rendered as text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueRange {
    /// The range as the source reports it, e.g. `Inventory!A2:U310`.
    pub range: String,
    pub values: Vec<Vec<String>>,
}

impl ValueRange {
    /// First cell of every row. Used for the single-column option ranges.
    pub fn first_column(&self) -> impl Iterator<Item = &str> {
        self.values
            .iter()
            .filter_map(|row| row.first().map(String::as_str))
    }
}

/// Anything that can read several ranges from a spreadsheet in one call.
#[async_trait]
pub trait SheetSource: Send + Sync {
    /// Returns one `ValueRange` per requested range, in request order.
    async fn batch_get(
        &self,
        spreadsheet_id: &str,
        ranges: &[String],
    ) -> Result<Vec<ValueRange>, SheetError>;
}

// ============================================================================
// RANGE HELPERS
// ============================================================================

fn column_number(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    letters.chars().try_fold(0usize, |acc, c| {
        c.is_ascii_alphabetic()
            .then(|| acc * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1))
    })
}

/// Number of columns an A1 range spans (`Sheet!B2:F` -> 5). `None` when the
/// range doesn't name both a start and an end column.
pub fn range_width(a1: &str) -> Option<usize> {
    let cells = a1.rsplit_once('!').map(|(_, cells)| cells).unwrap_or(a1);
    let (start, end) = cells.split_once(':')?;

    let letters = |cell: &str| -> String {
        cell.chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect()
    };

    let start = column_number(&letters(start))?;
    let end = column_number(&letters(end))?;
    (end >= start).then(|| end - start + 1)
}

// ============================================================================
// SERVICE
// ============================================================================

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Sheet(#[from] SheetError),
    #[error(transparent)]
    ColumnMap(#[from] ColumnMapError),
    #[error("Sheets API returned {returned} ranges, expected {expected}")]
    MissingRange { expected: usize, returned: usize },
}

/// The A1 ranges the catalog is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRanges {
    pub primary: String,
    pub pin_counts: String,
    pub manufacturers: String,
    pub term_sizes: Option<String>,
}

impl CatalogRanges {
    /// Request order for the batched read: primary, pins, manufacturers, then
    /// term sizes if configured.
    pub fn to_request(&self) -> Vec<String> {
        let mut ranges = vec![
            self.primary.clone(),
            self.pin_counts.clone(),
            self.manufacturers.clone(),
        ];
        if let Some(term_sizes) = &self.term_sizes {
            ranges.push(term_sizes.clone());
        }
        ranges
    }
}

pub struct CatalogService<S: SheetSource> {
    source: S,
    spreadsheet_id: String,
    ranges: CatalogRanges,
    normalizer: RowNormalizer,
}

impl<S: SheetSource> CatalogService<S> {
    pub fn new(
        source: S,
        spreadsheet_id: impl Into<String>,
        ranges: CatalogRanges,
        normalizer: RowNormalizer,
    ) -> Self {
        Self {
            source,
            spreadsheet_id: spreadsheet_id.into(),
            ranges,
            normalizer,
        }
    }

    /// Reads the sheet and builds the full catalog payload.
    pub async fn load(&self) -> Result<CatalogPayload, CatalogError> {
        let request = self.ranges.to_request();
        let mut fetched = self
            .source
            .batch_get(&self.spreadsheet_id, &request)
            .await?
            .into_iter();

        if fetched.len() < request.len() {
            return Err(CatalogError::MissingRange {
                expected: request.len(),
                returned: fetched.len(),
            });
        }

        // Length checked above, so every `next()` below yields a range.
        let primary = fetched.next().unwrap_or_default();
        let pins = fetched.next().unwrap_or_default();
        let manufacturers = fetched.next().unwrap_or_default();
        let term_sizes = self
            .ranges
            .term_sizes
            .as_ref()
            .map(|_| fetched.next().unwrap_or_default());

        match range_width(&primary.range) {
            Some(width) => self.normalizer.columns().validate_width(width)?,
            None => tracing::debug!(
                range = %primary.range,
                "Primary range has no column bounds; skipping column map check"
            ),
        }

        let items = self.normalizer.normalize(&primary.values);

        let payload = CatalogPayload {
            items,
            pin_options: extract_options(pins.first_column(), SortPreference::NumericFirst),
            manufacturer_options: extract_options(
                manufacturers.first_column(),
                SortPreference::Lexicographic,
            ),
            term_size_options: term_sizes
                .map(|range| extract_options(range.first_column(), SortPreference::NumericFirst)),
        };

        tracing::info!(
            items = payload.items.len(),
            pin_options = payload.pin_options.len(),
            manufacturer_options = payload.manufacturer_options.len(),
            "Catalog loaded"
        );

        Ok(payload)
    }
}
