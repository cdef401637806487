//! Field descriptors and dataset payload types.
//!
//! # Design
//! A dataset schema declares each column as one of a closed set of field
//! types. `Field` models that set as a sum type with a single `descriptor()`
//! operation that renders the attribute map the service expects, so adding a
//! variant forces every match site to handle it. The `Any` variant is an
//! escape hatch: it is the attribute map itself, passed through verbatim,
//! which keeps the client usable against descriptor shapes introduced after
//! this crate was written.
//!
//! No local validation happens here. Empty names, unknown currency codes and
//! malformed values are forwarded as-is and rejected (or not) by the service.

use std::collections::BTreeMap;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// One row of dataset data: column identifier to JSON scalar (or null).
pub type Record = Map<String, Value>;

/// A typed column declaration used when creating a dataset.
///
/// Variants mirror the field types the service supports. Data values must
/// follow the service's conventions: `Date` values are ISO 8601 dates
/// (`2016-01-01`), `DateTime` values are ISO 8601 timestamps, `Money` values
/// are integers in the smallest denomination of `currency_code` (cents for
/// USD), and `Percentage` values are decimals between 0 and 1.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    /// A text column.
    String { name: String },
    /// An ISO 8601 date column.
    Date { name: String },
    /// An ISO 8601 datetime column.
    DateTime { name: String },
    /// A numeric column. `optional` permits null values.
    Number { name: String, optional: bool },
    /// A monetary column, denominated in `currency_code`'s smallest unit.
    Money {
        name: String,
        currency_code: String,
        optional: bool,
    },
    /// A ratio column holding values between 0 and 1.
    Percentage { name: String, optional: bool },
    /// Raw descriptor attributes, sent to the service verbatim.
    Any(Map<String, Value>),
}

impl Field {
    /// Declare a text column.
    pub fn string(name: impl Into<String>) -> Self {
        Field::String { name: name.into() }
    }

    /// Declare a date column.
    pub fn date(name: impl Into<String>) -> Self {
        Field::Date { name: name.into() }
    }

    /// Declare a datetime column.
    pub fn datetime(name: impl Into<String>) -> Self {
        Field::DateTime { name: name.into() }
    }

    /// Declare a required number column. Use the struct form to mark it
    /// optional.
    pub fn number(name: impl Into<String>) -> Self {
        Field::Number {
            name: name.into(),
            optional: false,
        }
    }

    /// Declare a required money column denominated in `currency_code`.
    pub fn money(name: impl Into<String>, currency_code: impl Into<String>) -> Self {
        Field::Money {
            name: name.into(),
            currency_code: currency_code.into(),
            optional: false,
        }
    }

    /// Declare a required percentage column.
    pub fn percentage(name: impl Into<String>) -> Self {
        Field::Percentage {
            name: name.into(),
            optional: false,
        }
    }

    /// Render the descriptor attribute map sent to the service when the
    /// dataset is created.
    ///
    /// Every variant except `Any` produces at least `name` and `type`;
    /// `Any` is returned as constructed.
    pub fn descriptor(&self) -> Map<String, Value> {
        match self {
            Field::String { name } => typed(name, "string"),
            Field::Date { name } => typed(name, "date"),
            Field::DateTime { name } => typed(name, "datetime"),
            Field::Number { name, optional } => {
                let mut map = typed(name, "number");
                map.insert("optional".into(), Value::Bool(*optional));
                map
            }
            Field::Money {
                name,
                currency_code,
                optional,
            } => {
                let mut map = typed(name, "money");
                map.insert("optional".into(), Value::Bool(*optional));
                map.insert("currency_code".into(), Value::String(currency_code.clone()));
                map
            }
            Field::Percentage { name, optional } => {
                let mut map = typed(name, "percentage");
                map.insert("optional".into(), Value::Bool(*optional));
                map
            }
            Field::Any(attributes) => attributes.clone(),
        }
    }
}

fn typed(name: &str, kind: &str) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("name".into(), Value::String(name.to_string()));
    map.insert("type".into(), Value::String(kind.to_string()));
    map
}

/// Fields serialize as their descriptor map, so a `Schema` turns into the
/// service's create envelope with plain derives.
impl Serialize for Field {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.descriptor().serialize(serializer)
    }
}

/// The schema sent when declaring (or redeclaring) a dataset.
///
/// `fields` maps each column identifier to its declaration. `unique_by`
/// optionally names the columns forming the composite key that later
/// `push_data` calls merge on; every listed name should be a key of
/// `fields`, though only the service enforces that.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Schema {
    pub fields: BTreeMap<String, Field>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unique_by: Vec<String>,
}

/// A batch of records to append to or replace a dataset's contents.
///
/// `delete_by` names the columns used to prune matching existing records
/// during an append; it only applies to `push_data` and is never
/// transmitted by `replace_data`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Batch {
    #[serde(rename = "data")]
    pub records: Vec<Record>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub delete_by: Vec<String>,
}
