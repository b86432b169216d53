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

use crate::common::DefaultAppState;
use crate::manager::app::config::AppConfig;
use anyhow::Result;
use axum::Router;
use axum::http::{HeaderName, HeaderValue, Method, header};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

pub fn init_subscriber() {
    tracing::subscriber::set_global_default(
        FmtSubscriber::builder()
            .with_max_level(Level::INFO)
            .finish(),
    )
    .expect("setting default subscriber failed");
}

pub async fn init_default_app() -> Result<(Arc<AppConfig>, Router)> {
    let app_state = Arc::new(DefaultAppState::new().await?);
    app_state.migrate_main_db().await?;
    let config = app_state.config.clone();
    let app = router(app_state)?;
    Ok((config, app))
}

pub fn router(app_state: Arc<DefaultAppState>) -> Result<Router> {
    let cors = cors_layer(app_state.config.as_ref())?;
    Ok(Router::new()
        .merge(crate::manager::devices::routes::routes(app_state.clone()))
        .merge(crate::manager::users::routes::routes(app_state.clone()))
        .merge(crate::tenant::dashboard::routes::routes(app_state.clone()))
        .merge(crate::tenant::customers::routes::routes(app_state))
        .layer(cors)
        .layer(TraceLayer::new_for_http()))
}

fn cors_layer(config: &AppConfig) -> Result<CorsLayer> {
    let allow_origin = match config.cors().allowed_origin() {
        "*" => AllowOrigin::any(),
        origin => AllowOrigin::exact(HeaderValue::from_str(origin)?),
    };
    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("apikey"),
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("x-client-version"),
            HeaderName::from_static("x-client-device-id"),
        ]))
}
