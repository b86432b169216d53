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

use crate::manager::devices::model::{DeviceAttributes, UserDevice};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterLoginEventRequest {
    pub device_id: String,
    pub device_name: Option<String>,
    pub user_agent: Option<String>,
    pub locale: Option<String>,
    pub timezone: Option<String>,
    pub screen: Option<String>,
    #[serde(default)]
    pub resend: bool,
}

impl RegisterLoginEventRequest {
    pub fn into_attributes(self, ip_address: String) -> DeviceAttributes {
        DeviceAttributes {
            device_id: self.device_id.trim().to_string(),
            device_name: self.device_name,
            user_agent: self.user_agent,
            ip_address: Some(ip_address),
            locale: self.locale,
            timezone: self.timezone,
            screen: self.screen,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckDeviceStatusRequest {
    pub device_id: String,
    #[serde(default)]
    pub resend: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmDeviceRequest {
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmDeviceQuery {
    pub token: Option<String>,
}

/// Device projection returned to the client; the approval token never
/// leaves the gateway except inside the confirmation email.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DevicePublic {
    pub id: Uuid,
    pub device_id: String,
    pub device_name: Option<String>,
    pub status: String,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub last_seen_at: Option<DateTime<Utc>>,
}

impl From<&UserDevice> for DevicePublic {
    fn from(device: &UserDevice) -> Self {
        Self {
            id: device.id,
            device_id: device.device_id.clone(),
            device_name: device.device_name.clone(),
            status: device.status.clone(),
            confirmed_at: device.confirmed_at,
            last_seen_at: device.last_seen_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatusResponse {
    pub status: String,
    pub requires_confirmation: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<DevicePublic>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfirmDeviceResponse {
    pub status: String,
}
