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

use crate::common::dto::HandlerResult;
use crate::common::error::IntoFriendlyError;
use crate::common::extractors::ValidJson;
use crate::manager::auth::middleware::AuthenticatedUser;
use crate::tenant::customers::CustomersModule;
use crate::tenant::customers::dto::ToggleCustomerPausedRequest;
use crate::tenant::customers::service::CustomersService;
use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use std::sync::Arc;

pub async fn toggle_customer_paused(
    AuthenticatedUser(claims): AuthenticatedUser,
    State(module): State<Arc<dyn CustomersModule>>,
    ValidJson(payload): ValidJson<ToggleCustomerPausedRequest>,
) -> HandlerResult {
    let response = CustomersService::toggle_paused(&claims, &payload, module)
        .await
        .map_err(|e| e.into_friendly_error().into_response())?;
    Ok(Json(response).into_response())
}
