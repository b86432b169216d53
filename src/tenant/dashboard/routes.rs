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

use super::handler::{fetch_user_data, manage_graph, manage_table};
use crate::common::DefaultAppState;
use crate::common::rate_limit::{RateLimit, RateQuota, enforce_rate_limit};
use crate::manager::auth::middleware::{require_admin, require_auth};
use crate::manager::devices::DevicesModule;
use crate::manager::devices::middleware::require_approved_device;
use crate::tenant::dashboard::DashboardModule;
use axum::Router;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::post;
use std::sync::Arc;

pub fn routes(state: Arc<DefaultAppState>) -> Router {
    let config = state.config.clone();
    let window = config.rate_limit().window_secs();
    let default_max = config.rate_limit().default_max();
    let limiter = state.rate_limiter.clone();
    let devices_module: Arc<dyn DevicesModule> = state.clone();
    let dashboard_module: Arc<dyn DashboardModule> = state;

    Router::new()
        .merge(
            Router::new()
                .route("/fetchUserData", post(fetch_user_data))
                .layer(from_fn_with_state(config.clone(), require_auth))
                .layer(from_fn_with_state(
                    RateLimit::new(
                        limiter.clone(),
                        RateQuota::new("fetchUserData", default_max, window),
                    ),
                    enforce_rate_limit,
                ))
                .with_state(dashboard_module.clone()),
        )
        .merge(
            Router::new()
                .route("/manageGraph", post(manage_graph))
                .layer(from_fn_with_state(
                    devices_module.clone(),
                    require_approved_device,
                ))
                .layer(from_fn(require_admin))
                .layer(from_fn_with_state(config.clone(), require_auth))
                .layer(from_fn_with_state(
                    RateLimit::new(
                        limiter.clone(),
                        RateQuota::new("manageGraph", default_max, window),
                    ),
                    enforce_rate_limit,
                ))
                .with_state(dashboard_module.clone()),
        )
        .merge(
            Router::new()
                .route("/manageTable", post(manage_table))
                .layer(from_fn_with_state(devices_module, require_approved_device))
                .layer(from_fn(require_admin))
                .layer(from_fn_with_state(config, require_auth))
                .layer(from_fn_with_state(
                    RateLimit::new(
                        limiter,
                        RateQuota::new("manageTable", default_max, window),
                    ),
                    enforce_rate_limit,
                ))
                .with_state(dashboard_module),
        )
}
