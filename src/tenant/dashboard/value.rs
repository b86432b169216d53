/*
 * This file is part of the Alfred Dashboard Gateway.
 *
 * Copyright (C) 2025 Kovács Dávid <kapcsolat@kovacsdavid.dev>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published
 * by the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::postgres::PgRow;
use sqlx::{Column, Row, TypeInfo};
use tracing::warn;
use uuid::Uuid;

/// Largest integer a JSON consumer can hold without precision loss.
pub const JSON_SAFE_INT_MAX: i64 = 9_007_199_254_740_991;

/// A resolved query parameter, typed by the parameter schema. The tagged
/// representation is what lets one logical placeholder bind as the SQL form
/// its declared type requires.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
    TextArray(Vec<String>),
    IntArray(Vec<i64>),
    FloatArray(Vec<f64>),
    BoolArray(Vec<bool>),
    DateArray(Vec<NaiveDate>),
}

impl ParamValue {
    pub fn is_array(&self) -> bool {
        matches!(
            self,
            ParamValue::TextArray(_)
                | ParamValue::IntArray(_)
                | ParamValue::FloatArray(_)
                | ParamValue::BoolArray(_)
                | ParamValue::DateArray(_)
        )
    }

    /// JSON projection used by the `debug` echo of the batch response.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Normalises a 64-bit integer for transport: within the safe range it
/// stays a JSON number, outside it becomes a decimal string.
pub fn sanitize_int(value: i64) -> Value {
    if (-JSON_SAFE_INT_MAX..=JSON_SAFE_INT_MAX).contains(&value) {
        Value::from(value)
    } else {
        Value::String(value.to_string())
    }
}

fn sanitize_timestamp(value: DateTime<Utc>) -> Value {
    Value::String(value.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn sanitize_naive_timestamp(value: NaiveDateTime) -> Value {
    Value::String(value.format("%Y-%m-%dT%H:%M:%S%.3f").to_string())
}

fn sanitize_date(value: NaiveDate) -> Value {
    Value::String(value.format("%Y-%m-%d").to_string())
}

/// Converts one result row into a JSON object, normalising every value to a
/// transport-safe form: big integers become numbers or decimal strings,
/// temporal values become ISO 8601 strings, arrays and JSON columns are
/// carried over structurally.
pub fn row_to_json(row: &PgRow) -> Map<String, Value> {
    let mut object = Map::new();
    for (index, column) in row.columns().iter().enumerate() {
        let value = column_to_json(row, index, column.type_info().name());
        object.insert(column.name().to_string(), value);
    }
    object
}

fn column_to_json(row: &PgRow, index: usize, type_name: &str) -> Value {
    match type_name {
        "BOOL" => decode(row, index, |v: bool| Value::from(v)),
        "INT2" => decode(row, index, |v: i16| Value::from(v)),
        "INT4" => decode(row, index, |v: i32| Value::from(v)),
        "INT8" => decode(row, index, sanitize_int),
        "FLOAT4" => decode(row, index, |v: f32| Value::from(f64::from(v))),
        "FLOAT8" => decode(row, index, |v: f64| Value::from(v)),
        "NUMERIC" => decode(row, index, |v: BigDecimal| Value::String(v.to_string())),
        "TEXT" | "VARCHAR" | "BPCHAR" | "CHAR" | "NAME" | "CITEXT" => {
            decode(row, index, |v: String| Value::String(v))
        }
        "UUID" => decode(row, index, |v: Uuid| Value::String(v.to_string())),
        "DATE" => decode(row, index, sanitize_date),
        "TIME" => decode(row, index, |v: NaiveTime| {
            Value::String(v.format("%H:%M:%S%.3f").to_string())
        }),
        "TIMESTAMP" => decode(row, index, sanitize_naive_timestamp),
        "TIMESTAMPTZ" => decode(row, index, sanitize_timestamp),
        "JSON" | "JSONB" => decode(row, index, |v: Value| v),
        "BOOL[]" => decode_array(row, index, |v: bool| Value::from(v)),
        "INT2[]" => decode_array(row, index, |v: i16| Value::from(v)),
        "INT4[]" => decode_array(row, index, |v: i32| Value::from(v)),
        "INT8[]" => decode_array(row, index, sanitize_int),
        "FLOAT4[]" => decode_array(row, index, |v: f32| Value::from(f64::from(v))),
        "FLOAT8[]" => decode_array(row, index, |v: f64| Value::from(v)),
        "NUMERIC[]" => decode_array(row, index, |v: BigDecimal| Value::String(v.to_string())),
        "TEXT[]" | "VARCHAR[]" | "BPCHAR[]" | "NAME[]" => {
            decode_array(row, index, |v: String| Value::String(v))
        }
        "UUID[]" => decode_array(row, index, |v: Uuid| Value::String(v.to_string())),
        "DATE[]" => decode_array(row, index, sanitize_date),
        "TIMESTAMP[]" => decode_array(row, index, sanitize_naive_timestamp),
        "TIMESTAMPTZ[]" => decode_array(row, index, sanitize_timestamp),
        other => {
            // Last resort for exotic column types: textual projection.
            match row.try_get::<Option<String>, _>(index) {
                Ok(Some(v)) => Value::String(v),
                Ok(None) => Value::Null,
                Err(_) => {
                    warn!("Unsupported column type {other}, emitting null");
                    Value::Null
                }
            }
        }
    }
}

fn decode<'r, T, F>(row: &'r PgRow, index: usize, convert: F) -> Value
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
    F: FnOnce(T) -> Value,
{
    match row.try_get::<Option<T>, _>(index) {
        Ok(Some(v)) => convert(v),
        Ok(None) => Value::Null,
        Err(e) => {
            warn!("Could not decode column {index}: {e}");
            Value::Null
        }
    }
}

fn decode_array<'r, T, F>(row: &'r PgRow, index: usize, convert: F) -> Value
where
    Vec<T>: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
    F: Fn(T) -> Value,
{
    match row.try_get::<Option<Vec<T>>, _>(index) {
        Ok(Some(values)) => Value::Array(values.into_iter().map(convert).collect()),
        Ok(None) => Value::Null,
        Err(e) => {
            warn!("Could not decode array column {index}: {e}");
            Value::Null
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn safe_integers_stay_numbers() {
        assert_eq!(sanitize_int(42), json!(42));
        assert_eq!(sanitize_int(-JSON_SAFE_INT_MAX), json!(-9_007_199_254_740_991i64));
        assert_eq!(sanitize_int(JSON_SAFE_INT_MAX), json!(9_007_199_254_740_991i64));
    }

    #[test]
    fn unsafe_integers_become_decimal_strings() {
        assert_eq!(
            sanitize_int(JSON_SAFE_INT_MAX + 1),
            json!("9007199254740992")
        );
        assert_eq!(sanitize_int(i64::MIN), json!("-9223372036854775808"));
    }

    #[test]
    fn param_values_serialize_to_natural_json() {
        assert_eq!(ParamValue::Text("abc".to_string()).to_json(), json!("abc"));
        assert_eq!(ParamValue::Int(7).to_json(), json!(7));
        assert_eq!(ParamValue::Bool(true).to_json(), json!(true));
        assert_eq!(
            ParamValue::Date(NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()).to_json(),
            json!("2025-01-15")
        );
        assert_eq!(
            ParamValue::TextArray(vec!["a".to_string(), "b".to_string()]).to_json(),
            json!(["a", "b"])
        );
        assert_eq!(ParamValue::IntArray(vec![1, 2]).to_json(), json!([1, 2]));
    }

    #[test]
    fn only_array_variants_report_as_arrays() {
        assert!(ParamValue::TextArray(vec![]).is_array());
        assert!(ParamValue::DateArray(vec![]).is_array());
        assert!(!ParamValue::Text(String::new()).is_array());
        assert!(!ParamValue::Int(0).is_array());
    }

    #[test]
    fn timestamps_render_like_javascript_iso_strings() {
        let ts = DateTime::parse_from_rfc3339("2025-01-15T12:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(sanitize_timestamp(ts), json!("2025-01-15T12:30:00.000Z"));
    }
}
