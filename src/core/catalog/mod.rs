// Catalog module - sheet rows in, JSON catalog out.

pub mod catalog_models;
mod catalog_service;
pub mod column_map;
pub mod option_extractor;
pub mod row_normalizer;

pub use catalog_models::CatalogPayload;
pub use catalog_service::{
    CatalogError, CatalogRanges, CatalogService, SheetError, SheetSource, ValueRange,
};
pub use column_map::{ColumnMap, ColumnMapError};
pub use row_normalizer::RowNormalizer;
