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

use crate::tenant::dashboard::model::{ChartMetadata, TableMetadata};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One chart or table requested by the client, with its parameter bundle.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub slug: String,
    #[serde(default)]
    pub params: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FetchUserDataRequest {
    #[serde(default)]
    pub graphs: Option<Vec<QueryRequest>>,
    #[serde(default)]
    pub tables: Option<Vec<QueryRequest>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphResponse {
    pub id: i64,
    pub slug: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub result_shape: Option<Value>,
}

impl From<&ChartMetadata> for GraphResponse {
    fn from(chart: &ChartMetadata) -> Self {
        Self {
            id: chart.id,
            slug: chart.slug.clone(),
            title: chart.title.clone(),
            description: chart.description.clone(),
            result_shape: chart.result_shape.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TableResponse {
    pub id: i64,
    pub slug: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub column_config: Option<Value>,
    pub primary_key: Option<String>,
    pub result_shape: Option<Value>,
}

impl From<&TableMetadata> for TableResponse {
    fn from(table: &TableMetadata) -> Self {
        Self {
            id: table.id,
            slug: table.slug.clone(),
            title: table.title.clone(),
            description: table.description.clone(),
            column_config: table.column_config.clone(),
            primary_key: table.primary_key.clone(),
            result_shape: table.result_shape.clone(),
        }
    }
}

/// Per-query execution echo: the resolved parameters, the compiled text,
/// the bound arguments, and a small sample of the rows.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryDebug {
    pub slug: String,
    pub params: Value,
    pub query: String,
    pub args: Vec<Value>,
    pub row_count: usize,
    pub sample: Vec<Value>,
}

/// The combined batch document. Map keys are the numeric metadata ids
/// rendered as strings; clients must not rely on key insertion order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FetchUserDataResponse {
    pub company_name: String,
    pub graphics: Vec<GraphResponse>,
    pub datasets: BTreeMap<String, Vec<Map<String, Value>>>,
    pub debug: BTreeMap<String, QueryDebug>,
    pub errors: BTreeMap<String, String>,
    pub tables: Vec<TableResponse>,
    #[serde(rename = "tableRows")]
    pub table_rows: BTreeMap<String, Vec<Map<String, Value>>>,
    #[serde(rename = "tableDebug")]
    pub table_debug: BTreeMap<String, QueryDebug>,
    #[serde(rename = "tableErrors")]
    pub table_errors: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManageGraphRequest {
    #[serde(default)]
    pub id: Option<i64>,
    pub slug: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub query_template: String,
    #[serde(default)]
    pub param_schema: Option<Value>,
    #[serde(default)]
    pub default_params: Option<Value>,
    #[serde(default)]
    pub result_shape: Option<Value>,
    #[serde(default)]
    pub allowed_roles: Option<Vec<String>>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManageTableRequest {
    #[serde(default)]
    pub id: Option<i64>,
    pub slug: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub query_template: String,
    #[serde(default)]
    pub column_config: Option<Value>,
    #[serde(default)]
    pub param_schema: Option<Value>,
    #[serde(default)]
    pub default_params: Option<Value>,
    #[serde(default)]
    pub result_shape: Option<Value>,
    #[serde(default)]
    pub allowed_roles: Option<Vec<String>>,
    #[serde(default)]
    pub primary_key: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManageResponse {
    pub message: String,
    pub id: i64,
    pub slug: String,
    pub company_name: String,
}
