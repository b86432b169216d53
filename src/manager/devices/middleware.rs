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

use crate::common::error::{FriendlyError, IntoFriendlyError};
use crate::manager::auth::dto::Claims;
use crate::manager::devices::DevicesModule;
use crate::manager::devices::service::DevicesService;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::Level;

pub const DEVICE_ID_HEADER: &str = "x-client-device-id";

/// Runs after `require_auth` on sensitive routes: the caller must present
/// the device id header of an approved device.
pub async fn require_approved_device(
    State(module): State<Arc<dyn DevicesModule>>,
    req: Request,
    next: Next,
) -> Result<Response, Response> {
    let claims = req.extensions().get::<Claims>().cloned().ok_or_else(|| {
        FriendlyError::user_facing(
            Level::DEBUG,
            StatusCode::UNAUTHORIZED,
            file!(),
            "Não autenticado.",
        )
        .into_response()
    })?;

    let device_id = req
        .headers()
        .get(DEVICE_ID_HEADER)
        .and_then(|v| v.to_str().ok());

    DevicesService::require_approved(&claims, device_id, module)
        .await
        .map_err(|e| e.into_friendly_error().into_response())?;

    Ok(next.run(req).await)
}
