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

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

/// Declared type of one query parameter. The engine's only type awareness
/// lives here; the query template itself stays opaque text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Date,
    Boolean,
    Array,
}

/// Element schema of an array parameter.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ParamItemSchema {
    #[serde(rename = "type", default = "ParamItemSchema::default_kind")]
    pub kind: ParamType,
    #[serde(rename = "enum", default)]
    pub enum_values: Option<Vec<Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

impl ParamItemSchema {
    fn default_kind() -> ParamType {
        ParamType::String
    }
}

/// One entry of a metadata row's `param_schema` map.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ParamSchemaEntry {
    #[serde(rename = "type")]
    pub kind: ParamType,
    #[serde(default)]
    pub required: bool,
    #[serde(rename = "enum", default)]
    pub enum_values: Option<Vec<Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
    #[serde(default)]
    pub items: Option<ParamItemSchema>,
    #[serde(default)]
    pub default: Option<Value>,
}

impl ParamSchemaEntry {
    #[cfg(test)]
    pub fn of_type(kind: ParamType) -> Self {
        Self {
            kind,
            required: false,
            enum_values: None,
            minimum: None,
            maximum: None,
            items: None,
            default: None,
        }
    }
}

/// One row of `graficos_dashboard`. Read-only to the engine apart from the
/// administrative upsert endpoints.
#[derive(Debug, Clone, FromRow)]
pub struct ChartMetadata {
    pub id: i64,
    pub slug: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub query_template: String,
    pub param_schema: Option<Value>,
    pub default_params: Option<Value>,
    pub result_shape: Option<Value>,
    pub allowed_roles: Vec<String>,
    pub is_active: bool,
}

/// One row of `dashboard_tables`: a chart plus presentation columns and a
/// primary key for row identity on the client.
#[derive(Debug, Clone, FromRow)]
pub struct TableMetadata {
    pub id: i64,
    pub slug: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub query_template: String,
    pub column_config: Option<Value>,
    pub param_schema: Option<Value>,
    pub default_params: Option<Value>,
    pub result_shape: Option<Value>,
    pub allowed_roles: Vec<String>,
    pub primary_key: Option<String>,
    pub is_active: bool,
}

/// Column descriptor used when the gateway synthesizes the baseline
/// `clientes` table; author-supplied `column_config` JSON is echoed as-is.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnConfig {
    pub key: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub align: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    pub is_toggle: bool,
    pub hidden: bool,
}

impl ColumnConfig {
    pub fn new(key: &str, label: &str, kind: &str) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            kind: kind.to_string(),
            align: None,
            width: None,
            is_toggle: false,
            hidden: false,
        }
    }

    pub fn toggle(mut self) -> Self {
        self.is_toggle = true;
        self
    }
}
