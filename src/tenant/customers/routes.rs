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

use super::handler::toggle_customer_paused;
use crate::common::DefaultAppState;
use crate::common::rate_limit::{RateLimit, RateQuota, enforce_rate_limit};
use crate::manager::auth::middleware::require_auth;
use crate::manager::devices::DevicesModule;
use crate::manager::devices::middleware::require_approved_device;
use crate::tenant::customers::CustomersModule;
use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::post;
use std::sync::Arc;

pub fn routes(state: Arc<DefaultAppState>) -> Router {
    let config = state.config.clone();
    let window = config.rate_limit().window_secs();
    let limiter = state.rate_limiter.clone();
    let devices_module: Arc<dyn DevicesModule> = state.clone();
    let customers_module: Arc<dyn CustomersModule> = state;

    Router::new().merge(
        Router::new()
            .route("/toggleCustomerPaused", post(toggle_customer_paused))
            .layer(from_fn_with_state(devices_module, require_approved_device))
            .layer(from_fn_with_state(config, require_auth))
            .layer(from_fn_with_state(
                RateLimit::new(
                    limiter,
                    RateQuota::new("toggleCustomerPaused", 10, window),
                ),
                enforce_rate_limit,
            ))
            .with_state(customers_module),
    )
}
