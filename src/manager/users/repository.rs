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
use crate::manager::users::model::AuthUser;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde_json::Value;
use uuid::Uuid;

/// Administrative surface of the identity store: user provisioning and the
/// compensating delete used when persisting the tenant registry row fails.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait UsersRepository: Send + Sync {
    async fn insert_user(
        &self,
        email: &str,
        password_hash: &str,
        app_metadata: &Value,
    ) -> RepositoryResult<AuthUser>;

    async fn delete_user(&self, user_id: Uuid) -> RepositoryResult<()>;
}

#[async_trait]
impl UsersRepository for PgPoolManager {
    async fn insert_user(
        &self,
        email: &str,
        password_hash: &str,
        app_metadata: &Value,
    ) -> RepositoryResult<AuthUser> {
        Ok(sqlx::query_as::<_, AuthUser>(
            "INSERT INTO auth_users (
                    id, email, password_hash, app_metadata
            ) VALUES ($1, $2, $3, $4) RETURNING id, email, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(password_hash)
        .bind(app_metadata)
        .fetch_one(&self.get_main_pool())
        .await?)
    }

    async fn delete_user(&self, user_id: Uuid) -> RepositoryResult<()> {
        sqlx::query("DELETE FROM auth_users WHERE id = $1")
            .bind(user_id)
            .execute(&self.get_main_pool())
            .await?;
        Ok(())
    }
}
