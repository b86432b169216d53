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
use crate::common::extractors::client_ip::ClientIp;
use crate::manager::auth::middleware::AuthenticatedUser;
use crate::manager::devices::DevicesModule;
use crate::manager::devices::dto::{
    CheckDeviceStatusRequest, ConfirmDeviceQuery, ConfirmDeviceRequest, ConfirmDeviceResponse,
    RegisterLoginEventRequest,
};
use crate::manager::devices::service::{DevicesService, DevicesServiceError};
use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use handlebars::Handlebars;
use serde_json::json;
use std::sync::Arc;
use tracing::error;

pub async fn register_login_event(
    AuthenticatedUser(claims): AuthenticatedUser,
    ClientIp(ip): ClientIp,
    State(module): State<Arc<dyn DevicesModule>>,
    ValidJson(payload): ValidJson<RegisterLoginEventRequest>,
) -> HandlerResult {
    let resend = payload.resend;
    let attrs = payload.into_attributes(ip);
    let response = DevicesService::register_login(&claims, attrs, resend, module)
        .await
        .map_err(|e| e.into_friendly_error().into_response())?;
    Ok(Json(response).into_response())
}

pub async fn check_device_status(
    AuthenticatedUser(claims): AuthenticatedUser,
    State(module): State<Arc<dyn DevicesModule>>,
    ValidJson(payload): ValidJson<CheckDeviceStatusRequest>,
) -> HandlerResult {
    let response =
        DevicesService::check_status(&claims, &payload.device_id, payload.resend, module)
            .await
            .map_err(|e| e.into_friendly_error().into_response())?;
    Ok(Json(response).into_response())
}

pub async fn confirm_device(
    State(module): State<Arc<dyn DevicesModule>>,
    ValidJson(payload): ValidJson<ConfirmDeviceRequest>,
) -> HandlerResult {
    DevicesService::confirm(&payload.token, module)
        .await
        .map_err(|e| e.into_friendly_error().into_response())?;
    Ok(Json(ConfirmDeviceResponse {
        status: String::from("approved"),
    })
    .into_response())
}

/// Browser variant of the confirmation endpoint: the emailed link lands
/// here, so the response is a small self-contained HTML page instead of
/// JSON.
pub async fn confirm_device_page(
    State(module): State<Arc<dyn DevicesModule>>,
    Query(query): Query<ConfirmDeviceQuery>,
) -> Response {
    let token = query.token.unwrap_or_default();
    match DevicesService::confirm(&token, module).await {
        Ok(device) => confirm_page(
            StatusCode::OK,
            true,
            "Dispositivo confirmado!",
            &format!(
                "O dispositivo {} foi liberado. Você já pode voltar ao painel.",
                device
                    .device_name
                    .as_deref()
                    .unwrap_or("solicitado")
            ),
        ),
        Err(DevicesServiceError::TokenNotFound) => confirm_page(
            StatusCode::NOT_FOUND,
            false,
            "Link inválido",
            "Token não encontrado ou já utilizado.",
        ),
        Err(e) => {
            error!("Device confirmation failed: {e}");
            confirm_page(
                StatusCode::INTERNAL_SERVER_ERROR,
                false,
                "Erro inesperado",
                "Não foi possível confirmar o dispositivo. Tente novamente mais tarde.",
            )
        }
    }
}

const CONFIRM_PAGE_HTML: &str = r##"<!DOCTYPE html>
<html lang="pt-BR">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{{title}}</title>
    <style>
        body { font-family: Arial, Helvetica, sans-serif; background: #f4f6f8; margin: 0; }
        .card { max-width: 420px; margin: 12vh auto; background: #fff; border-radius: 8px;
                padding: 32px; box-shadow: 0 2px 8px rgba(0, 0, 0, 0.08); text-align: center; }
        h1 { font-size: 1.3rem; margin-bottom: 12px; }
        .ok { color: #1b873b; }
        .err { color: #c0392b; }
        p { color: #444; line-height: 1.5; }
    </style>
</head>
<body>
<div class="card">
    <h1 class="{{class}}">{{title}}</h1>
    <p>{{message}}</p>
</div>
</body>
</html>
"##;

fn confirm_page(status: StatusCode, success: bool, title: &str, message: &str) -> Response {
    let handlebars = Handlebars::new();
    match handlebars.render_template(
        CONFIRM_PAGE_HTML,
        &json!({
            "title": title,
            "message": message,
            "class": if success { "ok" } else { "err" },
        }),
    ) {
        Ok(page) => (status, Html(page)).into_response(),
        Err(e) => {
            error!("Could not render confirmation page: {e}");
            (status, Html(format!("<h1>{title}</h1><p>{message}</p>"))).into_response()
        }
    }
}
