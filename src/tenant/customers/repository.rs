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
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use sqlx::Row;

/// Write access to the tenant's `clientes` table. The pause flag is the
/// only mutation the gateway performs against tenant data.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CustomersRepository: Send + Sync {
    /// Flips `clientes.paused` and returns the new state, or `None` when
    /// the customer id does not exist.
    async fn toggle_paused(
        &self,
        coords: &TenantCoordinates,
        customer_id: i64,
    ) -> RepositoryResult<Option<(i64, bool)>>;
}

#[async_trait]
impl CustomersRepository for PgPoolManager {
    async fn toggle_paused(
        &self,
        coords: &TenantCoordinates,
        customer_id: i64,
    ) -> RepositoryResult<Option<(i64, bool)>> {
        let pool = self.get_tenant_pool(coords)?;
        let row = sqlx::query(
            "UPDATE clientes SET paused = NOT paused WHERE id = $1 RETURNING id, paused",
        )
        .bind(customer_id)
        .fetch_optional(&pool)
        .await?;
        match row {
            Some(row) => Ok(Some((row.try_get("id")?, row.try_get("paused")?))),
            None => Ok(None),
        }
    }
}
