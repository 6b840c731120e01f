//! Bundled default dataset
//!
//! Used when the storage slot is empty or unreadable, and by `diagtree init`.

use crate::model::ElementsData;

const SAMPLE_DATA_JSON: &str = include_str!("sample_data.json");

/// The bundled troubleshooting tree (a pressure washer repair guide)
pub fn default_data() -> ElementsData {
    match ElementsData::from_json(SAMPLE_DATA_JSON) {
        Ok(data) => data,
        Err(e) => {
            log::error!("bundled sample data is invalid: {}", e);
            ElementsData::default()
        }
    }
}

/// Raw JSON of the bundled dataset
pub fn default_json() -> &'static str {
    SAMPLE_DATA_JSON
}
