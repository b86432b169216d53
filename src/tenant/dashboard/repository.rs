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

use crate::common::error::RepositoryResult;
use crate::manager::app::database::{PgPoolManager, PoolManager};
use crate::manager::directory::model::TenantCoordinates;
use crate::tenant::dashboard::dto::{ManageGraphRequest, ManageTableRequest};
use crate::tenant::dashboard::model::{ChartMetadata, TableMetadata};
use crate::tenant::dashboard::value::{ParamValue, row_to_json};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde_json::{Map, Value};
use sqlx::Row;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;

pub const DEFAULT_ALLOWED_ROLES: [&str; 1] = ["user"];

/// Metadata reads and prepared-statement execution against one tenant's
/// database, plus the administrative metadata upserts. Every method
/// resolves the tenant pool from the coordinates; the pool releases each
/// borrowed connection on all exit paths.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DashboardRepository: Send + Sync {
    /// Active chart metadata, optionally filtered by slug, ascending id.
    async fn fetch_charts(
        &self,
        coords: &TenantCoordinates,
        slugs: &[String],
    ) -> RepositoryResult<Vec<ChartMetadata>>;

    /// Active table metadata, optionally filtered by slug, ascending id.
    async fn fetch_tables(
        &self,
        coords: &TenantCoordinates,
        slugs: &[String],
    ) -> RepositoryResult<Vec<TableMetadata>>;

    /// Executes one compiled statement and returns sanitised JSON rows.
    async fn run_query(
        &self,
        coords: &TenantCoordinates,
        sql: &str,
        args: &[ParamValue],
    ) -> RepositoryResult<Vec<Map<String, Value>>>;

    /// Probes `information_schema` for the baseline `clientes` table.
    /// Returns the recency column to order by (`ultimo_acesso`, falling
    /// back to `created_at`) or `None` when the table does not exist.
    async fn clientes_recency_column(
        &self,
        coords: &TenantCoordinates,
    ) -> RepositoryResult<Option<String>>;

    async fn upsert_chart(
        &self,
        coords: &TenantCoordinates,
        payload: &ManageGraphRequest,
    ) -> RepositoryResult<(i64, String)>;

    async fn upsert_table(
        &self,
        coords: &TenantCoordinates,
        payload: &ManageTableRequest,
    ) -> RepositoryResult<(i64, String)>;
}

fn bind_args<'q>(
    mut query: Query<'q, sqlx::Postgres, PgArguments>,
    args: &[ParamValue],
) -> Query<'q, sqlx::Postgres, PgArguments> {
    for arg in args {
        query = match arg {
            ParamValue::Text(v) => query.bind(v.clone()),
            ParamValue::Int(v) => query.bind(*v),
            ParamValue::Float(v) => query.bind(*v),
            ParamValue::Bool(v) => query.bind(*v),
            ParamValue::Date(v) => query.bind(*v),
            ParamValue::TextArray(v) => query.bind(v.clone()),
            ParamValue::IntArray(v) => query.bind(v.clone()),
            ParamValue::FloatArray(v) => query.bind(v.clone()),
            ParamValue::BoolArray(v) => query.bind(v.clone()),
            ParamValue::DateArray(v) => query.bind(v.clone()),
        };
    }
    query
}

#[async_trait]
impl DashboardRepository for PgPoolManager {
    async fn fetch_charts(
        &self,
        coords: &TenantCoordinates,
        slugs: &[String],
    ) -> RepositoryResult<Vec<ChartMetadata>> {
        let pool = self.get_tenant_pool(coords)?;
        Ok(sqlx::query_as::<_, ChartMetadata>(
            "SELECT id, slug, title, description, query_template, param_schema,
                        default_params, result_shape, allowed_roles, is_active
                 FROM graficos_dashboard
                 WHERE is_active = TRUE
                   AND (cardinality($1::text[]) = 0 OR slug = ANY($1))
                 ORDER BY id ASC",
        )
        .bind(slugs)
        .fetch_all(&pool)
        .await?)
    }

    async fn fetch_tables(
        &self,
        coords: &TenantCoordinates,
        slugs: &[String],
    ) -> RepositoryResult<Vec<TableMetadata>> {
        let pool = self.get_tenant_pool(coords)?;
        Ok(sqlx::query_as::<_, TableMetadata>(
            "SELECT id, slug, title, description, query_template, column_config,
                        param_schema, default_params, result_shape, allowed_roles,
                        primary_key, is_active
                 FROM dashboard_tables
                 WHERE is_active = TRUE
                   AND (cardinality($1::text[]) = 0 OR slug = ANY($1))
                 ORDER BY id ASC",
        )
        .bind(slugs)
        .fetch_all(&pool)
        .await?)
    }

    async fn run_query(
        &self,
        coords: &TenantCoordinates,
        sql: &str,
        args: &[ParamValue],
    ) -> RepositoryResult<Vec<Map<String, Value>>> {
        let pool = self.get_tenant_pool(coords)?;
        let rows = bind_args(sqlx::query(sql), args).fetch_all(&pool).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn clientes_recency_column(
        &self,
        coords: &TenantCoordinates,
    ) -> RepositoryResult<Option<String>> {
        let pool = self.get_tenant_pool(coords)?;
        let columns: Vec<String> = sqlx::query_scalar(
            "SELECT column_name::text
                 FROM information_schema.columns
                 WHERE table_schema = 'public'
                   AND table_name = 'clientes'
                   AND column_name IN ('ultimo_acesso', 'created_at')",
        )
        .fetch_all(&pool)
        .await?;
        if columns.iter().any(|c| c == "ultimo_acesso") {
            Ok(Some(String::from("ultimo_acesso")))
        } else if columns.iter().any(|c| c == "created_at") {
            Ok(Some(String::from("created_at")))
        } else {
            Ok(None)
        }
    }

    async fn upsert_chart(
        &self,
        coords: &TenantCoordinates,
        payload: &ManageGraphRequest,
    ) -> RepositoryResult<(i64, String)> {
        let pool = self.get_tenant_pool(coords)?;
        let allowed_roles = payload.allowed_roles.clone().unwrap_or_else(|| {
            DEFAULT_ALLOWED_ROLES.iter().map(|r| r.to_string()).collect()
        });
        let row = if let Some(id) = payload.id {
            sqlx::query(
                r#"
                UPDATE graficos_dashboard
                SET slug = $1,
                    title = $2,
                    description = $3,
                    query_template = $4,
                    param_schema = $5,
                    default_params = $6,
                    result_shape = $7,
                    allowed_roles = $8,
                    is_active = $9
                WHERE id = $10
                RETURNING id, slug
                "#,
            )
            .bind(&payload.slug)
            .bind(&payload.title)
            .bind(&payload.description)
            .bind(&payload.query_template)
            .bind(&payload.param_schema)
            .bind(&payload.default_params)
            .bind(&payload.result_shape)
            .bind(&allowed_roles)
            .bind(payload.is_active.unwrap_or(true))
            .bind(id)
            .fetch_one(&pool)
            .await?
        } else {
            sqlx::query(
                r#"
                INSERT INTO graficos_dashboard (
                    slug, title, description, query_template, param_schema,
                    default_params, result_shape, allowed_roles, is_active
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                RETURNING id, slug
                "#,
            )
            .bind(&payload.slug)
            .bind(&payload.title)
            .bind(&payload.description)
            .bind(&payload.query_template)
            .bind(&payload.param_schema)
            .bind(&payload.default_params)
            .bind(&payload.result_shape)
            .bind(&allowed_roles)
            .bind(payload.is_active.unwrap_or(true))
            .fetch_one(&pool)
            .await?
        };
        Ok((row.try_get("id")?, row.try_get("slug")?))
    }

    async fn upsert_table(
        &self,
        coords: &TenantCoordinates,
        payload: &ManageTableRequest,
    ) -> RepositoryResult<(i64, String)> {
        let pool = self.get_tenant_pool(coords)?;
        let allowed_roles = payload.allowed_roles.clone().unwrap_or_else(|| {
            DEFAULT_ALLOWED_ROLES.iter().map(|r| r.to_string()).collect()
        });
        let row = if let Some(id) = payload.id {
            sqlx::query(
                r#"
                UPDATE dashboard_tables
                SET slug = $1,
                    title = $2,
                    description = $3,
                    query_template = $4,
                    column_config = $5,
                    param_schema = $6,
                    default_params = $7,
                    result_shape = $8,
                    allowed_roles = $9,
                    primary_key = $10,
                    is_active = $11
                WHERE id = $12
                RETURNING id, slug
                "#,
            )
            .bind(&payload.slug)
            .bind(&payload.title)
            .bind(&payload.description)
            .bind(&payload.query_template)
            .bind(&payload.column_config)
            .bind(&payload.param_schema)
            .bind(&payload.default_params)
            .bind(&payload.result_shape)
            .bind(&allowed_roles)
            .bind(&payload.primary_key)
            .bind(payload.is_active.unwrap_or(true))
            .bind(id)
            .fetch_one(&pool)
            .await?
        } else {
            sqlx::query(
                r#"
                INSERT INTO dashboard_tables (
                    slug, title, description, query_template, column_config,
                    param_schema, default_params, result_shape, allowed_roles,
                    primary_key, is_active
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                RETURNING id, slug
                "#,
            )
            .bind(&payload.slug)
            .bind(&payload.title)
            .bind(&payload.description)
            .bind(&payload.query_template)
            .bind(&payload.column_config)
            .bind(&payload.param_schema)
            .bind(&payload.default_params)
            .bind(&payload.result_shape)
            .bind(&allowed_roles)
            .bind(&payload.primary_key)
            .bind(payload.is_active.unwrap_or(true))
            .fetch_one(&pool)
            .await?
        };
        Ok((row.try_get("id")?, row.try_get("slug")?))
    }
}
