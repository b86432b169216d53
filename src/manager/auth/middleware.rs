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

use crate::common::error::FriendlyError;
use crate::manager::app::config::AppConfig;
use crate::manager::auth::dto::Claims;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use std::sync::Arc;
use tracing::Level;

pub const ADMIN_ROLE: &str = "admin";

fn unauthenticated() -> Response {
    FriendlyError::user_facing(
        Level::DEBUG,
        StatusCode::UNAUTHORIZED,
        file!(),
        "Não autenticado.",
    )
    .into_response()
}

// ===== VERIFY =====
pub async fn require_auth(
    State(config): State<Arc<AppConfig>>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let Some(TypedHeader(Authorization(bearer))) = bearer else {
        return Err(unauthenticated());
    };

    let claims = Claims::from_token(
        bearer.token(),
        config.auth().jwt_secret().as_bytes(),
        config.auth().jwt_issuer(),
        config.auth().jwt_audience(),
    )
    .map_err(|_| unauthenticated())?;

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// Runs after `require_auth` on administrative routes: the derived role set
/// must contain `admin`.
pub async fn require_admin(req: Request, next: Next) -> Result<Response, Response> {
    let claims = req
        .extensions()
        .get::<Claims>()
        .ok_or_else(unauthenticated)?;

    if !claims.roles().contains(ADMIN_ROLE) {
        return Err(FriendlyError::user_facing(
            Level::DEBUG,
            StatusCode::FORBIDDEN,
            file!(),
            "Acesso restrito a administradores.",
        )
        .into_response());
    }

    Ok(next.run(req).await)
}

pub struct AuthenticatedUser(pub Claims);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .map(AuthenticatedUser)
            .ok_or_else(unauthenticated)
    }
}
