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

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

pub const DEVICE_STATUS_PENDING: &str = "pending";
pub const DEVICE_STATUS_APPROVED: &str = "approved";

/// One row of `security_user_devices`, unique per `(user_id, device_id)`.
///
/// A non-null `approval_token` has no lifetime other than single-use: it is
/// replaced on resend and cleared on confirmation.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct UserDevice {
    pub id: Uuid,
    pub user_id: Uuid,
    pub device_id: String,
    pub device_name: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub locale: Option<String>,
    pub timezone: Option<String>,
    pub screen: Option<String>,
    pub status: String,
    pub approval_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub last_seen_at: Option<DateTime<Utc>>,
}

impl UserDevice {
    /// The approved predicate: `status = approved` alone is not enough, the
    /// confirmation timestamp must be present as well.
    pub fn is_approved(&self) -> bool {
        self.status == DEVICE_STATUS_APPROVED && self.confirmed_at.is_some()
    }
}

/// Mutable device attributes captured from the client on every login.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceAttributes {
    pub device_id: String,
    pub device_name: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub locale: Option<String>,
    pub timezone: Option<String>,
    pub screen: Option<String>,
}

/// Append-only audit row for `security_login_events`.
#[derive(Debug, Clone)]
pub struct NewLoginEvent {
    pub user_id: Uuid,
    pub device_id: Option<String>,
    pub device_name: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub locale: Option<String>,
    pub timezone: Option<String>,
    pub metadata: Value,
}

impl NewLoginEvent {
    pub fn from_device(device: &UserDevice, metadata: Value) -> Self {
        Self {
            user_id: device.user_id,
            device_id: Some(device.device_id.clone()),
            device_name: device.device_name.clone(),
            ip_address: device.ip_address.clone(),
            user_agent: device.user_agent.clone(),
            locale: device.locale.clone(),
            timezone: device.timezone.clone(),
            metadata,
        }
    }
}
