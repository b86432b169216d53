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

use crate::common::{ConfigProvider, DefaultAppState};
use crate::manager::directory::repository::DirectoryRepository;
use crate::tenant::dashboard::repository::DashboardRepository;
use std::sync::Arc;

pub(crate) mod dto;
mod handler;
pub(crate) mod model;
pub(crate) mod params;
pub(crate) mod repository;
pub(crate) mod routes;
pub(crate) mod service;
pub(crate) mod template;
pub(crate) mod value;

pub trait DashboardModule: ConfigProvider + Send + Sync {
    fn dashboard_repo(&self) -> Arc<dyn DashboardRepository>;
    fn directory_repo(&self) -> Arc<dyn DirectoryRepository>;
}

impl DashboardModule for DefaultAppState {
    fn dashboard_repo(&self) -> Arc<dyn DashboardRepository> {
        self.pool_manager.clone()
    }
    fn directory_repo(&self) -> Arc<dyn DirectoryRepository> {
        self.pool_manager.clone()
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::manager::app::config::AppConfig;
    use mockall::mock;

    mock!(
        pub DashboardModule {}
        impl ConfigProvider for DashboardModule {
            fn config(&self) -> Arc<AppConfig>;
        }
        impl DashboardModule for DashboardModule {
            fn dashboard_repo(&self) -> Arc<dyn DashboardRepository>;
            fn directory_repo(&self) -> Arc<dyn DirectoryRepository>;
        }
    );
}
