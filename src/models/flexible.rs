// src/models/flexible.rs
// DOCUMENTATION: Normalizers for loosely-typed provider fields
// PURPOSE: Fields that arrive as either a number or a string become one canonical type

use serde::{Deserialize, Deserializer};

/// Raw shape of a field the provider sends as number, string or null
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Int(i64),
    Float(f64),
    Text(String),
    Other(serde_json::Value),
}

impl NumberOrString {
    fn into_canonical(self) -> String {
        match self {
            NumberOrString::Int(i) => i.to_string(),
            NumberOrString::Float(f) => (f.trunc() as i64).to_string(),
            NumberOrString::Text(s) => s,
            NumberOrString::Other(_) => String::new(),
        }
    }
}

/// Deserialize a number-or-string field into a String
/// DOCUMENTATION: 18 → "18", 18.0 → "18", "18" → "18", null/bool/object → ""
pub fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<NumberOrString>::deserialize(deserializer)?;
    Ok(raw.map(NumberOrString::into_canonical).unwrap_or_default())
}
