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

use super::handler::{
    check_device_status, confirm_device, confirm_device_page, register_login_event,
};
use crate::common::DefaultAppState;
use crate::common::rate_limit::{RateLimit, RateQuota, enforce_rate_limit};
use crate::manager::auth::middleware::require_auth;
use crate::manager::devices::DevicesModule;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

pub fn routes(state: Arc<DefaultAppState>) -> Router {
    let config = state.config.clone();
    let window = config.rate_limit().window_secs();
    let limiter = state.rate_limiter.clone();
    let devices_module: Arc<dyn DevicesModule> = state;

    Router::new()
        .merge(
            Router::new()
                .route("/registerLoginEvent", post(register_login_event))
                .layer(from_fn_with_state(config.clone(), require_auth))
                .layer(from_fn_with_state(
                    RateLimit::new(
                        limiter.clone(),
                        RateQuota::new("registerLoginEvent", 20, window),
                    ),
                    enforce_rate_limit,
                ))
                .with_state(devices_module.clone()),
        )
        .merge(
            Router::new()
                .route("/checkDeviceStatus", post(check_device_status))
                .layer(from_fn_with_state(config, require_auth))
                .layer(from_fn_with_state(
                    RateLimit::new(
                        limiter,
                        RateQuota::new("checkDeviceStatus", 30, window),
                    ),
                    enforce_rate_limit,
                ))
                .with_state(devices_module.clone()),
        )
        .merge(
            // The token itself is the capability here, so no bearer gate
            // and no quota.
            Router::new()
                .route(
                    "/confirmDevice",
                    get(confirm_device_page).post(confirm_device),
                )
                .with_state(devices_module),
        )
}
