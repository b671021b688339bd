// ============================================================================
// Record Model
// ============================================================================
//
// A fetched row: a fixed set of known string fields plus an open extension
// map for anything else the server sends. Known fields are what the grid
// displays, filters and edits; extension fields are carried through
// untouched so a commit never drops data the core does not understand.
//
// ============================================================================

use super::error::GridError;
use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Known record fields, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    PlantAddress1,
    Frame,
    PlantName,
    UnitName,
    SubName,
    MachineSn,
    CrmPlantId,
    CrmUnitId,
}

impl Field {
    pub const ALL: [Field; 8] = [
        Field::PlantAddress1,
        Field::Frame,
        Field::PlantName,
        Field::UnitName,
        Field::SubName,
        Field::MachineSn,
        Field::CrmPlantId,
        Field::CrmUnitId,
    ];

    /// Wire name of the field
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::PlantAddress1 => "PLANTADDRESS1",
            Field::Frame => "FRAME",
            Field::PlantName => "PLANTNAME",
            Field::UnitName => "UNITNAME",
            Field::SubName => "SUBNAME",
            Field::MachineSn => "MACHINESN",
            Field::CrmPlantId => "CRM_PLANT_ID",
            Field::CrmUnitId => "CRM_UNIT_ID",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .iter()
            .copied()
            .find(|field| field.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| GridError::UnknownField(s.to_string()))
    }
}

/// Pending edits for one row: editable field -> new value.
pub type RowEdits = BTreeMap<Field, String>;

/// Compares two field values, treating an absent field as the empty string.
pub(crate) fn same_value(a: Option<&str>, b: Option<&str>) -> bool {
    a.unwrap_or("") == b.unwrap_or("")
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    values: BTreeMap<Field, String>,
    extra: Map<String, JsonValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter, handy for fixtures
    pub fn with(mut self, field: Field, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        self.values.insert(field, value.into());
    }

    pub fn remove(&mut self, field: Field) -> Option<String> {
        self.values.remove(&field)
    }

    /// Known fields present on this record, in display order
    pub fn fields(&self) -> impl Iterator<Item = (Field, &str)> {
        self.values.iter().map(|(field, value)| (*field, value.as_str()))
    }

    /// Passthrough fields the core does not interpret
    pub fn extra(&self) -> &Map<String, JsonValue> {
        &self.extra
    }

    /// Store a raw JSON value. A key naming a known field is stringified
    /// into that field (`null` removes it) instead of the extension map, so
    /// a key never appears twice on the wire.
    pub fn insert_extra(&mut self, key: impl Into<String>, value: JsonValue) {
        let key = key.into();
        match Field::from_str(&key) {
            Ok(field) => match json_to_text(value) {
                Some(text) => {
                    self.values.insert(field, text);
                }
                None => {
                    self.values.remove(&field);
                }
            },
            Err(_) => {
                self.extra.insert(key, value);
            }
        }
    }

    /// Build a record from a JSON object.
    ///
    /// Known fields are stringified (`null` means absent); every other key
    /// lands in the extension map as-is.
    pub fn from_json_object(object: Map<String, JsonValue>) -> Self {
        let mut record = Record::new();
        for (key, value) in object {
            record.insert_extra(key, value);
        }
        record
    }

    pub fn to_json_object(&self) -> Map<String, JsonValue> {
        let mut object = self.extra.clone();
        for (field, value) in &self.values {
            object.insert(field.as_str().to_string(), JsonValue::String(value.clone()));
        }
        object
    }
}

fn json_to_text(value: JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s),
        JsonValue::Bool(b) => Some(b.to_string()),
        JsonValue::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len() + self.extra.len()))?;
        for (key, value) in &self.extra {
            map.serialize_entry(key, value)?;
        }
        for (field, value) in &self.values {
            map.serialize_entry(field.as_str(), value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let object = Map::<String, JsonValue>::deserialize(deserializer)?;
        Ok(Record::from_json_object(object))
    }
}

/// Apply overlay fields over `base`, leaving everything else untouched.
pub fn merge_overlay(base: &Record, overlay: &RowEdits) -> Record {
    let mut merged = base.clone();
    for (field, value) in overlay {
        merged.values.insert(*field, value.clone());
    }
    merged
}

/// Structural comparison of `base` and `candidate` over the editable fields.
pub fn fields_differ(base: &Record, candidate: &Record, editable: &BTreeSet<Field>) -> bool {
    editable
        .iter()
        .any(|field| !same_value(base.get(*field), candidate.get(*field)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn editable() -> BTreeSet<Field> {
        [Field::CrmPlantId, Field::CrmUnitId].into_iter().collect()
    }

    #[test]
    fn test_field_parse_is_case_insensitive() {
        assert_eq!("crm_plant_id".parse::<Field>().unwrap(), Field::CrmPlantId);
        assert_eq!("MACHINESN".parse::<Field>().unwrap(), Field::MachineSn);
        assert_eq!(
            "NOPE".parse::<Field>(),
            Err(GridError::UnknownField("NOPE".to_string()))
        );
    }

    #[test]
    fn test_merge_overlay_keeps_untouched_fields() {
        let base = Record::new()
            .with(Field::PlantName, "North")
            .with(Field::CrmPlantId, "A1");
        let overlay: RowEdits = [(Field::CrmPlantId, "A2".to_string())].into();

        let merged = merge_overlay(&base, &overlay);
        assert_eq!(merged.get(Field::CrmPlantId), Some("A2"));
        assert_eq!(merged.get(Field::PlantName), Some("North"));
        assert_eq!(base.get(Field::CrmPlantId), Some("A1"));
    }

    #[test]
    fn test_fields_differ_only_looks_at_editable_fields() {
        let base = Record::new()
            .with(Field::PlantName, "North")
            .with(Field::CrmPlantId, "A1");
        let renamed = base.clone().with(Field::PlantName, "South");
        assert!(!fields_differ(&base, &renamed, &editable()));

        let remapped = base.clone().with(Field::CrmPlantId, "A2");
        assert!(fields_differ(&base, &remapped, &editable()));
    }

    #[test]
    fn test_absent_field_equals_empty_string() {
        let base = Record::new();
        let blank = Record::new().with(Field::CrmUnitId, "");
        assert!(!fields_differ(&base, &blank, &editable()));
    }

    #[test]
    fn test_json_ingest_stringifies_known_fields() {
        let record: Record = serde_json::from_value(json!({
            "CRM_PLANT_ID": 42,
            "FRAME": null,
            "PLANTNAME": "North",
            "ROW_VERSION": 7
        }))
        .unwrap();

        assert_eq!(record.get(Field::CrmPlantId), Some("42"));
        assert_eq!(record.get(Field::Frame), None);
        assert_eq!(record.get(Field::PlantName), Some("North"));
        assert_eq!(record.extra().get("ROW_VERSION"), Some(&json!(7)));

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["CRM_PLANT_ID"], json!("42"));
        assert_eq!(back["ROW_VERSION"], json!(7));
    }

    #[test]
    fn test_extra_with_known_name_sets_the_field() {
        let mut record = Record::new().with(Field::CrmPlantId, "A1");
        record.insert_extra("CRM_PLANT_ID", json!("ZZ"));
        record.insert_extra("crm_unit_id", json!(7));
        record.insert_extra("ROW_VERSION", json!(3));

        assert_eq!(record.get(Field::CrmPlantId), Some("ZZ"));
        assert_eq!(record.get(Field::CrmUnitId), Some("7"));
        assert_eq!(record.extra().len(), 1);

        let text = serde_json::to_string(&record).unwrap();
        assert_eq!(text.matches("CRM_PLANT_ID").count(), 1);

        record.insert_extra("CRM_PLANT_ID", JsonValue::Null);
        assert_eq!(record.get(Field::CrmPlantId), None);
    }
}
