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

use crate::tenant::dashboard::model::{ParamItemSchema, ParamSchemaEntry, ParamType};
use crate::tenant::dashboard::value::ParamValue;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::warn;

/// Period parameters are recognised by name: authors call the lower bound
/// of a date range `inicio`/`start`/`begin` and the upper bound
/// `fim`/`final`/`end`. The coupling to author-chosen names is kept for
/// compatibility with the metadata already in production.
static PERIOD_START_NAMES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)inicio|início|start|begin").expect("static regex"));

const PERIOD_START_OFFSET_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamError {
    #[error("Parâmetro obrigatório ausente: {0}")]
    MissingRequired(String),

    #[error("Parâmetro '{0}' inválido: {1}")]
    Invalid(String, String),
}

enum NumberRepr {
    Int(i64),
    Float(f64),
}

/// Resolves the effective parameter bundle of one metadata row.
///
/// For every name declared in the schema the value is chosen in precedence
/// order `provided` > `defaults` > schema-level `default` > auto-default,
/// then validated and coerced to its declared type. Parameters provided by
/// the caller but absent from the schema are accepted as-is and logged.
///
/// `today` is injected so that date auto-defaults are deterministic.
pub fn resolve_params(
    schema: &BTreeMap<String, ParamSchemaEntry>,
    defaults: Option<&Map<String, Value>>,
    provided: Option<&Map<String, Value>>,
    today: NaiveDate,
) -> Result<BTreeMap<String, ParamValue>, ParamError> {
    let mut resolved = BTreeMap::new();

    for (name, entry) in schema {
        match pick_value(name, entry, defaults, provided, today) {
            Some(value) => {
                resolved.insert(name.clone(), coerce(name, &value, entry)?);
            }
            None => {
                if entry.required {
                    return Err(ParamError::MissingRequired(name.clone()));
                }
            }
        }
    }

    if let Some(provided) = provided {
        for (name, value) in provided {
            if schema.contains_key(name) || value.is_null() {
                continue;
            }
            warn!("Parameter {name} is not declared in the schema, passing it through");
            if let Some(passthrough) = passthrough_value(value) {
                resolved.insert(name.clone(), passthrough);
            }
        }
    }

    Ok(resolved)
}

fn pick_value(
    name: &str,
    entry: &ParamSchemaEntry,
    defaults: Option<&Map<String, Value>>,
    provided: Option<&Map<String, Value>>,
    today: NaiveDate,
) -> Option<Value> {
    if let Some(value) = provided.and_then(|p| p.get(name)).filter(|v| !v.is_null()) {
        return Some(value.clone());
    }
    if let Some(value) = defaults.and_then(|d| d.get(name)).filter(|v| !v.is_null()) {
        return Some(value.clone());
    }
    if let Some(value) = entry.default.clone().filter(|v| !v.is_null()) {
        return Some(value);
    }
    auto_default(name, entry, today)
}

/// Synthesises a value for a parameter nobody supplied.
///
/// Dates default to today, except names matching the period-start pattern,
/// which default to thirty days ago. Numbers fall back to `minimum`, then
/// to a `maximum` below 1000, then to zero. Arrays fall back to the full
/// item enum. Strings and booleans have no auto-default.
fn auto_default(name: &str, entry: &ParamSchemaEntry, today: NaiveDate) -> Option<Value> {
    match entry.kind {
        ParamType::Date => {
            // Upper-bound period names (fim/final/end) and plain date names
            // both default to today.
            let date = if PERIOD_START_NAMES.is_match(name) {
                today - Duration::days(PERIOD_START_OFFSET_DAYS)
            } else {
                today
            };
            Some(Value::String(date.format("%Y-%m-%d").to_string()))
        }
        ParamType::Number => {
            let number = if let Some(minimum) = entry.minimum {
                minimum
            } else if let Some(maximum) = entry.maximum.filter(|m| *m < 1000.0) {
                maximum
            } else {
                0.0
            };
            Some(number_to_value(number))
        }
        ParamType::Array => entry
            .items
            .as_ref()
            .and_then(|items| items.enum_values.clone())
            .filter(|values| !values.is_empty())
            .map(Value::Array),
        ParamType::String | ParamType::Boolean => None,
    }
}

fn number_to_value(number: f64) -> Value {
    if number.fract() == 0.0 && number.abs() < 9.0e15 {
        Value::from(number as i64)
    } else {
        Value::from(number)
    }
}

fn coerce(name: &str, value: &Value, entry: &ParamSchemaEntry) -> Result<ParamValue, ParamError> {
    match entry.kind {
        ParamType::String => coerce_string(name, value, entry.enum_values.as_deref()),
        ParamType::Number => Ok(
            match numeric_value(
                name,
                value,
                entry.minimum,
                entry.maximum,
                entry.enum_values.as_deref(),
            )? {
                NumberRepr::Int(v) => ParamValue::Int(v),
                NumberRepr::Float(v) => ParamValue::Float(v),
            },
        ),
        ParamType::Date => coerce_date(name, value).map(ParamValue::Date),
        ParamType::Boolean => coerce_boolean(name, value).map(ParamValue::Bool),
        ParamType::Array => coerce_array(name, value, entry.items.as_ref()),
    }
}

fn coerce_string(
    name: &str,
    value: &Value,
    enum_values: Option<&[Value]>,
) -> Result<ParamValue, ParamError> {
    string_value(name, value, enum_values).map(ParamValue::Text)
}

fn string_value(
    name: &str,
    value: &Value,
    enum_values: Option<&[Value]>,
) -> Result<String, ParamError> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => serde_json::to_string(other).map_err(|e| {
            ParamError::Invalid(name.to_string(), format!("não pôde ser convertido: {e}"))
        })?,
    };
    if let Some(enums) = enum_values
        && !enums.iter().any(|e| e.as_str() == Some(text.as_str()))
    {
        return Err(ParamError::Invalid(
            name.to_string(),
            format!("valor '{text}' fora da lista permitida"),
        ));
    }
    Ok(text)
}

fn numeric_value(
    name: &str,
    value: &Value,
    minimum: Option<f64>,
    maximum: Option<f64>,
    enum_values: Option<&[Value]>,
) -> Result<NumberRepr, ParamError> {
    let number = match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| {
            ParamError::Invalid(name.to_string(), "número fora do intervalo".to_string())
        })?,
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| {
            ParamError::Invalid(name.to_string(), format!("'{s}' não é um número"))
        })?,
        _ => {
            return Err(ParamError::Invalid(
                name.to_string(),
                "valor numérico esperado".to_string(),
            ));
        }
    };

    if let Some(minimum) = minimum
        && number < minimum
    {
        return Err(ParamError::Invalid(
            name.to_string(),
            format!("abaixo do mínimo {minimum}"),
        ));
    }
    if let Some(maximum) = maximum
        && number > maximum
    {
        return Err(ParamError::Invalid(
            name.to_string(),
            format!("acima do máximo {maximum}"),
        ));
    }
    if let Some(enums) = enum_values
        && !enums.iter().any(|e| e.as_f64() == Some(number))
    {
        return Err(ParamError::Invalid(
            name.to_string(),
            format!("valor {number} fora da lista permitida"),
        ));
    }

    if number.fract() == 0.0 && number.abs() < 9.0e15 {
        Ok(NumberRepr::Int(number as i64))
    } else {
        Ok(NumberRepr::Float(number))
    }
}

fn coerce_date(name: &str, value: &Value) -> Result<NaiveDate, ParamError> {
    match value {
        Value::String(s) => {
            let text = s.trim();
            if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
                return Ok(date);
            }
            if let Ok(datetime) = DateTime::parse_from_rfc3339(text) {
                return Ok(datetime.date_naive());
            }
            for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
                if let Ok(datetime) = NaiveDateTime::parse_from_str(text, format) {
                    return Ok(datetime.date());
                }
            }
            Err(ParamError::Invalid(
                name.to_string(),
                format!("'{text}' não é uma data válida"),
            ))
        }
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .map(|dt| dt.date_naive())
            .ok_or_else(|| {
                ParamError::Invalid(name.to_string(), "timestamp inválido".to_string())
            }),
        _ => Err(ParamError::Invalid(
            name.to_string(),
            "data esperada".to_string(),
        )),
    }
}

fn coerce_boolean(name: &str, value: &Value) -> Result<bool, ParamError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            other => Err(ParamError::Invalid(
                name.to_string(),
                format!("'{other}' não é um booleano"),
            )),
        },
        Value::Number(n) => Ok(n.as_f64().is_some_and(|v| v != 0.0)),
        _ => Err(ParamError::Invalid(
            name.to_string(),
            "booleano esperado".to_string(),
        )),
    }
}

fn coerce_array(
    name: &str,
    value: &Value,
    items: Option<&ParamItemSchema>,
) -> Result<ParamValue, ParamError> {
    let elements: Vec<Value> = match value {
        Value::Array(items) => items.clone(),
        Value::String(s) => {
            let text = s.trim();
            if text.is_empty() {
                return Err(ParamError::Invalid(
                    name.to_string(),
                    "lista vazia".to_string(),
                ));
            }
            text.split(',')
                .map(|part| Value::String(part.trim().to_string()))
                .collect()
        }
        _ => {
            return Err(ParamError::Invalid(
                name.to_string(),
                "lista esperada".to_string(),
            ));
        }
    };

    let fallback = ParamItemSchema {
        kind: ParamType::String,
        enum_values: None,
        minimum: None,
        maximum: None,
    };
    let item_schema = items.unwrap_or(&fallback);

    match item_schema.kind {
        ParamType::String => {
            let mut values = Vec::with_capacity(elements.len());
            for element in &elements {
                values.push(string_value(
                    name,
                    element,
                    item_schema.enum_values.as_deref(),
                )?);
            }
            Ok(ParamValue::TextArray(values))
        }
        ParamType::Number => {
            let mut ints = Vec::with_capacity(elements.len());
            let mut floats = Vec::with_capacity(elements.len());
            let mut all_int = true;
            for element in &elements {
                match numeric_value(
                    name,
                    element,
                    item_schema.minimum,
                    item_schema.maximum,
                    item_schema.enum_values.as_deref(),
                )? {
                    NumberRepr::Int(v) => {
                        ints.push(v);
                        floats.push(v as f64);
                    }
                    NumberRepr::Float(v) => {
                        all_int = false;
                        floats.push(v);
                    }
                }
            }
            if all_int {
                Ok(ParamValue::IntArray(ints))
            } else {
                Ok(ParamValue::FloatArray(floats))
            }
        }
        ParamType::Date => {
            let mut values = Vec::with_capacity(elements.len());
            for element in &elements {
                values.push(coerce_date(name, element)?);
            }
            Ok(ParamValue::DateArray(values))
        }
        ParamType::Boolean => {
            let mut values = Vec::with_capacity(elements.len());
            for element in &elements {
                values.push(coerce_boolean(name, element)?);
            }
            Ok(ParamValue::BoolArray(values))
        }
        ParamType::Array => Err(ParamError::Invalid(
            name.to_string(),
            "listas aninhadas não são suportadas".to_string(),
        )),
    }
}

/// Best-effort typing of an undeclared parameter so it can still be bound.
fn passthrough_value(value: &Value) -> Option<ParamValue> {
    match value {
        Value::String(s) => Some(ParamValue::Text(s.clone())),
        Value::Bool(b) => Some(ParamValue::Bool(*b)),
        Value::Number(n) => Some(match n.as_i64() {
            Some(v) => ParamValue::Int(v),
            None => ParamValue::Float(n.as_f64().unwrap_or(0.0)),
        }),
        Value::Array(items) => {
            if items.iter().all(Value::is_string) {
                Some(ParamValue::TextArray(
                    items
                        .iter()
                        .filter_map(|i| i.as_str().map(str::to_string))
                        .collect(),
                ))
            } else if items.iter().all(|i| i.as_i64().is_some()) {
                Some(ParamValue::IntArray(
                    items.iter().filter_map(Value::as_i64).collect(),
                ))
            } else if items.iter().all(|i| i.as_f64().is_some()) {
                Some(ParamValue::FloatArray(
                    items.iter().filter_map(Value::as_f64).collect(),
                ))
            } else {
                Some(ParamValue::Text(value.to_string()))
            }
        }
        Value::Object(_) => Some(ParamValue::Text(value.to_string())),
        Value::Null => None,
    }
}
