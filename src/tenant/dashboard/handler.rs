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
use crate::tenant::dashboard::DashboardModule;
use crate::tenant::dashboard::dto::{
    FetchUserDataRequest, ManageGraphRequest, ManageTableRequest,
};
use crate::tenant::dashboard::service::DashboardService;
use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use std::sync::Arc;

pub async fn fetch_user_data(
    AuthenticatedUser(claims): AuthenticatedUser,
    State(module): State<Arc<dyn DashboardModule>>,
    ValidJson(payload): ValidJson<FetchUserDataRequest>,
) -> HandlerResult {
    let response = DashboardService::fetch_user_data(&claims, payload, module)
        .await
        .map_err(|e| e.into_friendly_error().into_response())?;
    Ok(Json(response).into_response())
}

pub async fn manage_graph(
    AuthenticatedUser(claims): AuthenticatedUser,
    State(module): State<Arc<dyn DashboardModule>>,
    ValidJson(payload): ValidJson<ManageGraphRequest>,
) -> HandlerResult {
    let response = DashboardService::manage_graph(&claims, payload, module)
        .await
        .map_err(|e| e.into_friendly_error().into_response())?;
    Ok(Json(response).into_response())
}

pub async fn manage_table(
    AuthenticatedUser(claims): AuthenticatedUser,
    State(module): State<Arc<dyn DashboardModule>>,
    ValidJson(payload): ValidJson<ManageTableRequest>,
) -> HandlerResult {
    let response = DashboardService::manage_table(&claims, payload, module)
        .await
        .map_err(|e| e.into_friendly_error().into_response())?;
    Ok(Json(response).into_response())
}
