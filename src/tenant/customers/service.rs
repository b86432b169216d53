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

use crate::common::error::{FriendlyError, IntoFriendlyError, RepositoryError};
use crate::manager::auth::dto::Claims;
use crate::tenant::customers::CustomersModule;
use crate::tenant::customers::dto::{ToggleCustomerPausedRequest, ToggleCustomerPausedResponse};
use axum::http::StatusCode;
use std::sync::Arc;
use thiserror::Error;
use tracing::Level;

#[derive(Debug, Error)]
pub enum CustomersServiceError {
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Empresa não configurada para este usuário.")]
    TenantNotFound,

    #[error("Cliente não encontrado.")]
    CustomerNotFound,
}

impl IntoFriendlyError for CustomersServiceError {
    fn into_friendly_error(self) -> FriendlyError {
        match self {
            Self::TenantNotFound | Self::CustomerNotFound => FriendlyError::user_facing(
                Level::DEBUG,
                StatusCode::NOT_FOUND,
                file!(),
                &self.to_string(),
            ),
            e => FriendlyError::internal(file!(), e.to_string()),
        }
    }
}

pub struct CustomersService;

impl CustomersService {
    pub async fn toggle_paused(
        claims: &Claims,
        payload: &ToggleCustomerPausedRequest,
        module: Arc<dyn CustomersModule>,
    ) -> Result<ToggleCustomerPausedResponse, CustomersServiceError> {
        let coords = module
            .directory_repo()
            .get_by_user_id(claims.sub())
            .await?
            .ok_or(CustomersServiceError::TenantNotFound)?;

        let (customer_id, paused) = module
            .customers_repo()
            .toggle_paused(&coords, payload.customer_id)
            .await?
            .ok_or(CustomersServiceError::CustomerNotFound)?;

        Ok(ToggleCustomerPausedResponse { customer_id, paused })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::directory::model::TenantCoordinates;
    use crate::manager::directory::repository::{DirectoryRepository, MockDirectoryRepository};
    use crate::tenant::customers::repository::{CustomersRepository, MockCustomersRepository};
    use crate::tenant::customers::tests::MockCustomersModule;
    use pretty_assertions::assert_eq;
    use serde_json::Value;
    use uuid::Uuid;

    fn claims() -> Claims {
        Claims::new(
            Uuid::new_v4(),
            2_000_000_000,
            1_700_000_000,
            "http://localhost:9999/auth/v1".to_string(),
            "authenticated".to_string(),
            None,
            Value::Null,
            Value::Null,
        )
    }

    fn coords(user_id: Uuid) -> TenantCoordinates {
        TenantCoordinates {
            id_user: user_id,
            db_host: "db.empresa.example".to_string(),
            db_name: "empresa".to_string(),
            db_user: "alfred_reader".to_string(),
            db_password: "s3cr3t".to_string(),
            company_name: "Empresa Exemplo".to_string(),
        }
    }

    fn module_with(
        user_id: Uuid,
        customers_repo: MockCustomersRepository,
    ) -> Arc<dyn CustomersModule> {
        let customers_repo: Arc<dyn CustomersRepository> = Arc::new(customers_repo);
        let mut directory = MockDirectoryRepository::new();
        directory
            .expect_get_by_user_id()
            .returning(move |_| Ok(Some(coords(user_id))));
        let directory: Arc<dyn DirectoryRepository> = Arc::new(directory);

        let mut module = MockCustomersModule::new();
        module
            .expect_customers_repo()
            .returning(move || customers_repo.clone());
        module
            .expect_directory_repo()
            .returning(move || directory.clone());
        Arc::new(module)
    }

    #[tokio::test]
    async fn toggles_the_pause_flag() {
        let claims = claims();
        let mut repo = MockCustomersRepository::new();
        repo.expect_toggle_paused()
            .withf(|_, id| *id == 42)
            .returning(|_, id| Ok(Some((id, true))));

        let response = CustomersService::toggle_paused(
            &claims,
            &ToggleCustomerPausedRequest { customer_id: 42 },
            module_with(claims.sub(), repo),
        )
        .await
        .unwrap();

        assert_eq!(response.customer_id, 42);
        assert!(response.paused);
    }

    #[tokio::test]
    async fn unknown_customer_is_not_found() {
        let claims = claims();
        let mut repo = MockCustomersRepository::new();
        repo.expect_toggle_paused().returning(|_, _| Ok(None));

        let result = CustomersService::toggle_paused(
            &claims,
            &ToggleCustomerPausedRequest { customer_id: 99 },
            module_with(claims.sub(), repo),
        )
        .await;

        assert!(matches!(
            result,
            Err(CustomersServiceError::CustomerNotFound)
        ));
    }
}
