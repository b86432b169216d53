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

use crate::common::error::{RepositoryError, RepositoryResult};
use crate::manager::app::database::{PgPoolManager, PoolManager};
use crate::manager::directory::model::{CompanyListing, TenantCoordinates};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use sqlx::Error;
use uuid::Uuid;

/// Read/write access to the central `db_info` registry that maps a
/// principal id to its tenant database coordinates.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DirectoryRepository: Send + Sync {
    /// Reads exactly one registry row for the given principal id.
    /// `Ok(None)` means the principal has no tenant configured.
    async fn get_by_user_id(&self, user_id: Uuid) -> RepositoryResult<Option<TenantCoordinates>>;

    /// Inserts a registry row for a freshly provisioned user. The
    /// `id_user` column is the primary key, so a second insert for the
    /// same principal surfaces as a unique violation.
    async fn insert(&self, coords: &TenantCoordinates) -> RepositoryResult<()>;

    async fn list_companies(&self) -> RepositoryResult<Vec<CompanyListing>>;
}

#[async_trait]
impl DirectoryRepository for PgPoolManager {
    async fn get_by_user_id(&self, user_id: Uuid) -> RepositoryResult<Option<TenantCoordinates>> {
        let result = sqlx::query_as::<_, TenantCoordinates>(
            "SELECT id_user, db_host, db_name, db_user, db_password, company_name
                 FROM db_info
                 WHERE id_user = $1",
        )
        .bind(user_id)
        .fetch_one(&self.get_main_pool())
        .await;
        match result {
            Ok(coords) => Ok(Some(coords)),
            Err(Error::RowNotFound) => Ok(None),
            Err(e) => Err(RepositoryError::Database(e)),
        }
    }

    async fn insert(&self, coords: &TenantCoordinates) -> RepositoryResult<()> {
        sqlx::query(
            "INSERT INTO db_info (
                    id_user, db_host, db_name, db_user, db_password, company_name
            ) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(coords.id_user)
        .bind(&coords.db_host)
        .bind(&coords.db_name)
        .bind(&coords.db_user)
        .bind(&coords.db_password)
        .bind(&coords.company_name)
        .execute(&self.get_main_pool())
        .await?;
        Ok(())
    }

    async fn list_companies(&self) -> RepositoryResult<Vec<CompanyListing>> {
        Ok(sqlx::query_as::<_, CompanyListing>(
            "SELECT id_user, company_name, db_host, db_name
                 FROM db_info
                 ORDER BY company_name ASC",
        )
        .fetch_all(&self.get_main_pool())
        .await?)
    }
}
