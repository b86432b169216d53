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

use std::sync::Arc;

use crate::common::error::RepositoryError;
use crate::common::rate_limit::RateLimiter;
use crate::manager::app::config::AppConfig;
use crate::manager::app::database::{PgPoolManager, PoolManager};
use crate::manager::directory::model::TenantCoordinates;
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    transport::smtp::authentication::Credentials,
};
use sqlx::PgPool;
use tracing::{error, warn};

pub(crate) mod dto;
pub(crate) mod error;
pub(crate) mod extractors;
pub(crate) mod rate_limit;
pub(crate) mod services;

pub trait ConfigProvider: Send + Sync {
    fn config(&self) -> Arc<AppConfig>;
}

#[async_trait]
pub trait MailTransporter: ConfigProvider + Send + Sync {
    /// Hands a message to the SMTP relay and reports delivery as a boolean.
    /// Security emails never fail their calling flow: a missing transport or
    /// a relay error is logged and surfaces as `false`.
    async fn send(&self, message: Message) -> bool;
}

pub struct AppState<P, T>
where
    P: Send + Sync,
    T: Send + Sync,
{
    pub config: Arc<AppConfig>,
    pub smtp_transport: Option<Arc<T>>,
    pub pool_manager: Arc<P>,
    pub rate_limiter: Arc<RateLimiter>,
}

pub type DefaultSmtpTransport = AsyncSmtpTransport<Tokio1Executor>;
pub type DefaultAppState = AppState<PgPoolManager, DefaultSmtpTransport>;

impl DefaultAppState {
    fn init_config() -> anyhow::Result<AppConfig> {
        Ok(AppConfig::from_env()?)
    }
    async fn init_pool_manager(config: Arc<AppConfig>) -> anyhow::Result<PgPoolManager> {
        Ok(PgPoolManager::new(config.main_database(), config.tenant_database()).await?)
    }
    fn init_smtp_transport(config: Arc<AppConfig>) -> anyhow::Result<Option<DefaultSmtpTransport>> {
        if !config.mail().has_credentials() {
            warn!("SMTP credentials are not configured, security emails will be skipped");
            return Ok(None);
        }
        Ok(Some(
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(config.mail().smtp_host())?
                .credentials(Credentials::new(
                    config.mail().smtp_user().to_owned(),
                    config.mail().smtp_passwd().to_owned(),
                ))
                .build(),
        ))
    }
    pub async fn new() -> anyhow::Result<DefaultAppState> {
        let config = Arc::new(Self::init_config()?);
        let pool_manager = Arc::new(Self::init_pool_manager(config.clone()).await?);
        Ok(Self {
            config: config.clone(),
            smtp_transport: Self::init_smtp_transport(config.clone())?.map(Arc::new),
            pool_manager,
            rate_limiter: Arc::new(RateLimiter::new()),
        })
    }
    pub async fn migrate_main_db(&self) -> anyhow::Result<()> {
        Ok(self.pool_manager.migrate_main_db().await?)
    }
}

impl<P, T> ConfigProvider for AppState<P, T>
where
    P: Send + Sync,
    T: Send + Sync,
{
    fn config(&self) -> Arc<AppConfig> {
        self.config.clone()
    }
}

#[async_trait]
impl<P> MailTransporter for AppState<P, DefaultSmtpTransport>
where
    P: Send + Sync,
{
    async fn send(&self, message: Message) -> bool {
        let Some(transport) = &self.smtp_transport else {
            warn!("SMTP transport unavailable, dropping security email");
            return false;
        };
        match transport.send(message).await {
            Ok(_) => true,
            Err(e) => {
                error!("Could not deliver security email: {e}");
                false
            }
        }
    }
}

impl<T> PoolManager for AppState<PgPoolManager, T>
where
    T: Send + Sync,
{
    fn get_main_pool(&self) -> PgPool {
        self.pool_manager.get_main_pool()
    }
    fn get_tenant_pool(&self, coords: &TenantCoordinates) -> Result<PgPool, RepositoryError> {
        self.pool_manager.get_tenant_pool(coords)
    }
}
