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
use crate::manager::devices::model::{DeviceAttributes, NewLoginEvent, UserDevice};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use uuid::Uuid;

/// `DevicesRepository` is an asynchronous trait that defines the operations
/// for the device-approval rows and the login audit trail, both stored in
/// the central registry database.
///
/// Device rows are the only shared mutable domain state of the gateway;
/// conflicts are resolved by the `(user_id, device_id)` upsert and by
/// row-level updates keyed on the surrogate id.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DevicesRepository: Send + Sync {
    async fn get_by_user_device(
        &self,
        user_id: Uuid,
        device_id: &str,
    ) -> RepositoryResult<Option<UserDevice>>;

    async fn get_by_token(&self, token: &str) -> RepositoryResult<Option<UserDevice>>;

    /// Creates the pending row for a first login, or refreshes the mutable
    /// attributes and the approval token when a concurrent request already
    /// created it.
    async fn upsert_pending(
        &self,
        user_id: Uuid,
        attrs: &DeviceAttributes,
        token: &str,
    ) -> RepositoryResult<UserDevice>;

    /// Replaces the single-use approval token on a pending row.
    async fn replace_token(&self, id: Uuid, token: &str) -> RepositoryResult<UserDevice>;

    /// Consumes the token: status becomes `approved`, `confirmed_at` and
    /// `last_seen_at` are stamped, the token column is cleared.
    async fn approve(&self, id: Uuid) -> RepositoryResult<UserDevice>;

    /// Refreshes mutable attributes and `last_seen_at` on a subsequent
    /// login from a known device. Attributes omitted by the client keep
    /// their stored value.
    async fn touch_last_seen(
        &self,
        id: Uuid,
        attrs: &DeviceAttributes,
    ) -> RepositoryResult<UserDevice>;

    async fn insert_login_event(&self, event: &NewLoginEvent) -> RepositoryResult<()>;

    /// Email address of the device owner, read from the provisioned users
    /// store. Needed when a confirmation arrives through the
    /// unauthenticated capability link and no claims are available.
    async fn owner_email(&self, user_id: Uuid) -> RepositoryResult<Option<String>>;
}

#[async_trait]
impl DevicesRepository for PgPoolManager {
    async fn get_by_user_device(
        &self,
        user_id: Uuid,
        device_id: &str,
    ) -> RepositoryResult<Option<UserDevice>> {
        Ok(sqlx::query_as::<_, UserDevice>(
            "SELECT * FROM security_user_devices WHERE user_id = $1 AND device_id = $2",
        )
        .bind(user_id)
        .bind(device_id)
        .fetch_optional(&self.get_main_pool())
        .await?)
    }

    async fn get_by_token(&self, token: &str) -> RepositoryResult<Option<UserDevice>> {
        Ok(sqlx::query_as::<_, UserDevice>(
            "SELECT * FROM security_user_devices WHERE approval_token = $1",
        )
        .bind(token)
        .fetch_optional(&self.get_main_pool())
        .await?)
    }

    async fn upsert_pending(
        &self,
        user_id: Uuid,
        attrs: &DeviceAttributes,
        token: &str,
    ) -> RepositoryResult<UserDevice> {
        Ok(sqlx::query_as::<_, UserDevice>(
            r#"
            INSERT INTO security_user_devices (
                user_id, device_id, device_name, user_agent, ip_address,
                locale, timezone, screen, status, approval_token
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'pending', $9)
            ON CONFLICT (user_id, device_id) DO UPDATE SET
                device_name = EXCLUDED.device_name,
                user_agent = EXCLUDED.user_agent,
                ip_address = EXCLUDED.ip_address,
                locale = EXCLUDED.locale,
                timezone = EXCLUDED.timezone,
                screen = EXCLUDED.screen,
                approval_token = EXCLUDED.approval_token,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(&attrs.device_id)
        .bind(&attrs.device_name)
        .bind(&attrs.user_agent)
        .bind(&attrs.ip_address)
        .bind(&attrs.locale)
        .bind(&attrs.timezone)
        .bind(&attrs.screen)
        .bind(token)
        .fetch_one(&self.get_main_pool())
        .await?)
    }

    async fn replace_token(&self, id: Uuid, token: &str) -> RepositoryResult<UserDevice> {
        Ok(sqlx::query_as::<_, UserDevice>(
            r#"
            UPDATE security_user_devices
            SET approval_token = $2,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(token)
        .fetch_one(&self.get_main_pool())
        .await?)
    }

    async fn approve(&self, id: Uuid) -> RepositoryResult<UserDevice> {
        Ok(sqlx::query_as::<_, UserDevice>(
            r#"
            UPDATE security_user_devices
            SET status = 'approved',
                confirmed_at = NOW(),
                approval_token = NULL,
                last_seen_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_one(&self.get_main_pool())
        .await?)
    }

    async fn touch_last_seen(
        &self,
        id: Uuid,
        attrs: &DeviceAttributes,
    ) -> RepositoryResult<UserDevice> {
        Ok(sqlx::query_as::<_, UserDevice>(
            r#"
            UPDATE security_user_devices
            SET device_name = COALESCE($2, device_name),
                user_agent = COALESCE($3, user_agent),
                ip_address = COALESCE($4, ip_address),
                locale = COALESCE($5, locale),
                timezone = COALESCE($6, timezone),
                screen = COALESCE($7, screen),
                last_seen_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&attrs.device_name)
        .bind(&attrs.user_agent)
        .bind(&attrs.ip_address)
        .bind(&attrs.locale)
        .bind(&attrs.timezone)
        .bind(&attrs.screen)
        .fetch_one(&self.get_main_pool())
        .await?)
    }

    async fn insert_login_event(&self, event: &NewLoginEvent) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO security_login_events (
                user_id, device_id, device_name, ip_address,
                user_agent, locale, timezone, metadata
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(event.user_id)
        .bind(&event.device_id)
        .bind(&event.device_name)
        .bind(&event.ip_address)
        .bind(&event.user_agent)
        .bind(&event.locale)
        .bind(&event.timezone)
        .bind(&event.metadata)
        .execute(&self.get_main_pool())
        .await?;
        Ok(())
    }

    async fn owner_email(&self, user_id: Uuid) -> RepositoryResult<Option<String>> {
        Ok(
            sqlx::query_scalar::<_, String>("SELECT email FROM auth_users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.get_main_pool())
                .await?,
        )
    }
}
