use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;

/// Units seen in numeric questions, keyed by their whitespace-free form.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UnitLexicon {
    units: BTreeMap<String, String>,
}

/// Indexed form of one lexicon entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitDocument {
    pub cleaned_unit: String,
    pub unit: String,
}

pub fn normalize_units(units: &str) -> String {
    units.chars().filter(|c| !c.is_whitespace()).collect()
}

impl UnitLexicon {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a unit; the first display form seen for a normalized unit wins.
    pub fn insert(&mut self, units: &str) {
        let cleaned = normalize_units(units);
        if cleaned.is_empty() {
            return;
        }
        self.units
            .entry(cleaned)
            .or_insert_with(|| units.trim().to_string());
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.units
            .iter()
            .map(|(cleaned, unit)| (cleaned.as_str(), unit.as_str()))
    }

    pub fn documents(&self) -> Vec<UnitDocument> {
        self.iter()
            .map(|(cleaned, unit)| UnitDocument {
                cleaned_unit: cleaned.to_string(),
                unit: unit.to_string(),
            })
            .collect()
    }
}
