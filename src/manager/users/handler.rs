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
use crate::manager::users::UsersModule;
use crate::manager::users::dto::RegisterUserRequest;
use crate::manager::users::service::UsersService;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use std::sync::Arc;

pub async fn register_user(
    State(module): State<Arc<dyn UsersModule>>,
    ValidJson(payload): ValidJson<RegisterUserRequest>,
) -> HandlerResult {
    let response = UsersService::register(payload, module)
        .await
        .map_err(|e| e.into_friendly_error().into_response())?;
    Ok((StatusCode::CREATED, Json(response)).into_response())
}

pub async fn list_companies(State(module): State<Arc<dyn UsersModule>>) -> HandlerResult {
    let response = UsersService::list_companies(module)
        .await
        .map_err(|e| e.into_friendly_error().into_response())?;
    Ok(Json(response).into_response())
}
