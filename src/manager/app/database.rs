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

use crate::common::error::{RepositoryError, RepositoryResult};
use crate::manager::app::config::{MainDatabaseConfig, TenantDatabaseConfig};
use crate::manager::directory::model::TenantCoordinates;
#[cfg(test)]
use mockall::automock;
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::info;

/// Trait defining the behavior for managing PostgreSQL connection pools.
///
/// This trait provides a contract for interacting with the central registry
/// database and with the per-tenant databases resolved at request time.
///
/// # Methods
///
/// ## get_main_pool
/// Retrieves the connection pool of the central registry database
/// (principals, tenant coordinates, device approvals, login events).
///
/// ## get_tenant_pool
/// Resolves the bounded connection pool for the tenant described by the
/// given coordinates, opening it lazily on first use. Pools are cached by
/// their composed connection string and stay alive until process shutdown;
/// sqlx returns every borrowed connection to its pool on all exit paths,
/// including failures inside the borrowing code.
#[cfg_attr(test, automock)]
pub trait PoolManager: Send + Sync {
    fn get_main_pool(&self) -> PgPool;
    fn get_tenant_pool(&self, coords: &TenantCoordinates) -> Result<PgPool, RepositoryError>;
}

/// `PgPoolManager` is a structure designed to manage the gateway's
/// PostgreSQL connection pools.
///
/// # Fields
///
/// * `main_pool`:
///   The connection pool of the central registry database.
///
/// * `tenant_defaults`:
///   Pool parameters applied to every tenant pool (fallback port, bounded
///   size, acquire timeout); the coordinates themselves arrive per request.
///
/// * `tenant_pools`:
///   An `Arc<RwLock<HashMap<String, PgPool>>>` that maintains the lazily
///   created pools keyed by their composed connection string. Wrapped in an
///   `Arc` for shared ownership and an `RwLock` to enable thread-safe read
///   and write access.
pub struct PgPoolManager {
    main_pool: PgPool,
    tenant_defaults: TenantDatabaseConfig,
    tenant_pools: Arc<RwLock<HashMap<String, PgPool>>>,
}

impl PgPoolManager {
    /// Creates a new instance of `PgPoolManager` connected to the central
    /// registry database.
    ///
    /// # Errors
    ///
    /// This function will return an error if the registry pool fails to
    /// initialize.
    pub async fn new(
        main_database_config: &MainDatabaseConfig,
        tenant_defaults: &TenantDatabaseConfig,
    ) -> Result<PgPoolManager, RepositoryError> {
        let main_pool = PgPoolOptions::new()
            .max_connections(main_database_config.pool_size())
            .acquire_timeout(Duration::from_secs(3))
            .connect(&main_database_config.url())
            .await?;
        Ok(Self {
            main_pool,
            tenant_defaults: tenant_defaults.clone(),
            tenant_pools: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Runs the registry database migrations (device approvals, login
    /// events, `db_info`, provisioned users). Tenant databases are customer
    /// property and are never migrated by the gateway.
    pub async fn migrate_main_db(&self) -> RepositoryResult<()> {
        Ok(sqlx::migrate!("./migrations/main")
            .run(&self.main_pool)
            .await?)
    }
}

impl PoolManager for PgPoolManager {
    fn get_main_pool(&self) -> PgPool {
        self.main_pool.clone()
    }

    fn get_tenant_pool(&self, coords: &TenantCoordinates) -> Result<PgPool, RepositoryError> {
        let url = coords.connection_url(self.tenant_defaults.default_port());

        {
            let guard = self
                .tenant_pools
                .read()
                .map_err(|e| RepositoryError::RwLockReadGuard(e.to_string()))?;
            if let Some(pool) = guard.get(&url) {
                return Ok(pool.clone());
            }
        }

        let options = PgConnectOptions::from_str(&url)?;
        let pool = PgPoolOptions::new()
            .max_connections(self.tenant_defaults.pool_size())
            .acquire_timeout(Duration::from_secs(
                self.tenant_defaults.acquire_timeout_secs(),
            ))
            .connect_lazy_with(options);

        let mut guard = self
            .tenant_pools
            .write()
            .map_err(|e| RepositoryError::RwLockWriteGuard(e.to_string()))?;
        // A concurrent request may have opened the same pool in between the
        // read and the write lock; the first insert wins.
        let pool = guard.entry(url).or_insert(pool).clone();
        info!(company = %coords.company_name, "Tenant pool resolved");
        Ok(pool)
    }
}
