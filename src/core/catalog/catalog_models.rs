// Catalog domain models.
//
// These are the records the Catalog Reader hands to the frontend. They are
// built fresh from sheet rows on every request and never mutated afterwards,
// so everything here is plain data with serde derives.

use std::collections::BTreeMap;

use serde::Serialize;

// ============================================================================
// OEM ENUM
// ============================================================================

/// Vehicle brands a connector can be tagged as compatible with.
///
/// The declaration order is the display order of the derived `vehicles`
/// string, regardless of how the columns are laid out in the sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Oem {
    Ford,
    Gm,
    HyundaiKia,
    Nissan,
    Toyota,
}

impl Oem {
    /// Name shown to users and used as the key in `oemFlags`.
    pub fn label(&self) -> &'static str {
        match self {
            Oem::Ford => "Ford",
            Oem::Gm => "GM",
            Oem::HyundaiKia => "Hyundai/Kia",
            Oem::Nissan => "Nissan",
            Oem::Toyota => "Toyota",
        }
    }

    /// Every OEM in display order.
    pub fn all() -> [Oem; 5] {
        [Oem::Ford, Oem::Gm, Oem::HyundaiKia, Oem::Nissan, Oem::Toyota]
    }
}

// ============================================================================
// ITEM
// ============================================================================

/// Quantity on hand at one stock location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockLocation {
    pub label: String,
    pub quantity: u32,
}

/// Code and position range for one terminal slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Terminal {
    pub code: String,
    pub range: String,
}

/// A price cell. Clean numbers go out as JSON numbers, anything else
/// ("call for quote", "") is kept as the text the sheet had.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Price {
    Amount(f64),
    Text(String),
}

impl Default for Price {
    fn default() -> Self {
        Price::Text(String::new())
    }
}

/// Secondary attributes shown in the item detail view.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDetails {
    pub terminal1: Terminal,
    pub terminal2: Terminal,
    pub mating_part: String,
    pub price: Price,
    /// Raw flag cells keyed by OEM label, exactly as they appear in the sheet.
    pub oem_flags: BTreeMap<String, String>,
}

/// One normalized inventory row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub part_number: String,
    pub description: String,
    pub alt_number: String,
    pub locations: [StockLocation; 2],
    pub pin_count: String,
    pub category: String,
    pub gender: String,
    pub manufacturer: String,
    /// Comma-and-space joined OEM labels, in `Oem::all()` order.
    pub vehicles: String,
    /// Fetchable image URL, or empty when the row has no picture.
    pub picture: String,
    pub details: ItemDetails,
}

// ============================================================================
// RESPONSE PAYLOAD
// ============================================================================

/// Body of a successful catalog response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogPayload {
    pub items: Vec<Item>,
    pub pin_options: Vec<String>,
    pub manufacturer_options: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub term_size_options: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oem_order_is_fixed() {
        let labels: Vec<&str> = Oem::all().iter().map(|o| o.label()).collect();
        assert_eq!(labels, vec!["Ford", "GM", "Hyundai/Kia", "Nissan", "Toyota"]);
    }

    #[test]
    fn price_serializes_untagged() {
        assert_eq!(serde_json::to_string(&Price::Amount(12.5)).unwrap(), "12.5");
        assert_eq!(
            serde_json::to_string(&Price::Text("call for quote".into())).unwrap(),
            "\"call for quote\""
        );
    }

    #[test]
    fn payload_omits_missing_term_sizes() {
        let payload = CatalogPayload {
            items: vec![],
            pin_options: vec!["2".into()],
            manufacturer_options: vec![],
            term_size_options: None,
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["pinOptions"], serde_json::json!(["2"]));
        assert!(json.get("termSizeOptions").is_none());
    }
}
