// src/mapping.rs
use crate::error::{Result, WriterError};
use csv::StringRecord;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::HashMap;

/// One destination document, keyed by destination field name in column order.
pub type Record = Map<String, Value>;

pub const IGNORED_COLUMN_TYPE: &str = "ignore";

const INTEGER_TYPES: [&str; 4] = ["long", "integer", "short", "byte"];
const FLOAT_TYPES: [&str; 4] = ["double", "float", "half_float", "scaled_float"];

/// A declared column rule as it appears in the table `items` list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ColumnMapping {
    pub name: String,
    #[serde(rename = "dbName")]
    pub db_name: String,
    pub r#type: String,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

fn default_nullable() -> bool {
    true
}

impl ColumnMapping {
    pub fn new(name: &str, db_name: &str, r#type: &str, nullable: bool) -> Self {
        Self {
            name: name.to_string(),
            db_name: db_name.to_string(),
            r#type: r#type.to_string(),
            nullable,
        }
    }

    pub fn column_type(&self) -> ColumnType {
        ColumnType::from_tag(&self.r#type)
    }

    pub fn is_ignored(&self) -> bool {
        self.r#type == IGNORED_COLUMN_TYPE
    }
}

/// Coercion strategy selected by a column's type tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Float,
    Boolean,
    Array,
    Ignore,
    /// Destination scalars such as `text` or `keyword`; stored as given.
    Scalar,
}

impl ColumnType {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            t if INTEGER_TYPES.contains(&t) => ColumnType::Integer,
            t if FLOAT_TYPES.contains(&t) => ColumnType::Float,
            "boolean" => ColumnType::Boolean,
            "array" => ColumnType::Array,
            IGNORED_COLUMN_TYPE => ColumnType::Ignore,
            _ => ColumnType::Scalar,
        }
    }

    pub fn coerce(&self, raw: &str, nullable: bool) -> Result<Value> {
        if raw.is_empty() && nullable {
            return Ok(Value::Null);
        }

        let value = match self {
            ColumnType::Integer => coerce_integer(raw),
            ColumnType::Float => coerce_float(raw),
            ColumnType::Boolean => Value::Bool(coerce_bool(raw)),
            ColumnType::Array => serde_json::from_str(raw).map_err(|_| WriterError::ValueDecode {
                value: raw.to_string(),
            })?,
            ColumnType::Ignore | ColumnType::Scalar => Value::String(raw.to_string()),
        };
        Ok(value)
    }
}

// Integers that do not survive a parse/format round trip (out of range,
// leading zeros, signs, garbage) are kept as the original string.
fn coerce_integer(raw: &str) -> Value {
    match raw.parse::<i64>() {
        Ok(n) if n.to_string() == raw => Value::Number(n.into()),
        _ => Value::String(raw.to_string()),
    }
}

fn coerce_float(raw: &str) -> Value {
    let prefix = numeric_prefix(raw.trim_start());
    let parsed = if prefix.is_empty() {
        0.0
    } else {
        prefix.parse::<f64>().unwrap_or(0.0)
    };
    Number::from_f64(parsed)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(raw.to_string()))
}

/// Longest leading slice that reads as a decimal float literal.
fn numeric_prefix(s: &str) -> &str {
    let bytes = s.as_bytes();
    let mut end = 0;
    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if frac_end > frac_start || digits > 0 {
            end = frac_end;
        }
    }
    if digits == 0 {
        return "";
    }
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }
    &s[..end]
}

fn coerce_bool(raw: &str) -> bool {
    let lower = raw.to_lowercase();
    match lower.chars().next() {
        Some('t') => true,
        Some('f') => false,
        // generic string truthiness: only "" and "0" are false
        _ => !(lower.is_empty() || lower == "0"),
    }
}

/// Column rules for one table, keyed by source column name.
#[derive(Debug, Clone, Default)]
pub struct ColumnsMapper {
    columns: Vec<ColumnMapping>,
    by_name: HashMap<String, usize>,
}

impl ColumnsMapper {
    pub fn new(columns: &[ColumnMapping]) -> Self {
        let mut mapper = Self::default();
        for column in columns {
            match mapper.by_name.get(&column.name) {
                // last registration wins, first position is kept
                Some(&pos) => mapper.columns[pos] = column.clone(),
                None => {
                    mapper.by_name.insert(column.name.clone(), mapper.columns.len());
                    mapper.columns.push(column.clone());
                }
            }
        }
        mapper
    }

    pub fn all_columns(&self) -> &[ColumnMapping] {
        &self.columns
    }

    pub fn get(&self, name: &str) -> Option<&ColumnMapping> {
        self.by_name.get(name).map(|&pos| &self.columns[pos])
    }

    pub fn map_row(&self, header: &StringRecord, values: &StringRecord) -> Result<Record> {
        let mut record = Record::new();

        for (idx, csv_name) in header.iter().enumerate() {
            let value = values.get(idx).ok_or(WriterError::MalformedRow)?;

            match self.get(csv_name) {
                None => {
                    record.insert(csv_name.to_string(), Value::String(value.to_string()));
                }
                Some(column) if column.is_ignored() => {}
                Some(column) => {
                    let mapped = column.column_type().coerce(value, column.nullable)?;
                    record.insert(column.db_name.clone(), mapped);
                }
            }
        }

        Ok(record)
    }
}
