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
use crate::manager::directory::model::TenantCoordinates;
use crate::manager::users::UsersModule;
use crate::manager::users::dto::{CompaniesResponse, RegisterUserRequest, RegisterUserResponse};
use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::http::StatusCode;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::{Level, error};

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Error)]
pub enum UsersServiceError {
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("E-mail inválido.")]
    InvalidEmail,

    #[error("A senha deve ter pelo menos 8 caracteres.")]
    WeakPassword,

    #[error("Dados de conexão da empresa incompletos.")]
    MissingDatabaseField,

    #[error("E-mail já cadastrado.")]
    EmailTaken,

    #[error("Usuário já possui empresa configurada.")]
    CompanyExists,

    #[error("Hash error: {0}")]
    Hash(String),
}

impl IntoFriendlyError for UsersServiceError {
    fn into_friendly_error(self) -> FriendlyError {
        match self {
            Self::InvalidEmail | Self::WeakPassword | Self::MissingDatabaseField => {
                FriendlyError::user_facing(
                    Level::DEBUG,
                    StatusCode::BAD_REQUEST,
                    file!(),
                    &self.to_string(),
                )
            }
            Self::EmailTaken | Self::CompanyExists => FriendlyError::user_facing(
                Level::DEBUG,
                StatusCode::CONFLICT,
                file!(),
                &self.to_string(),
            ),
            e => FriendlyError::internal(file!(), e.to_string()),
        }
    }
}

pub struct UsersService;

type UsersServiceResult<T> = Result<T, UsersServiceError>;

impl UsersService {
    /// Provisions a dashboard user together with its tenant registry row.
    ///
    /// The two writes have no shared transaction (the identity store is an
    /// external collaborator), so the rollback is explicit: when the
    /// registry insert fails, the freshly created user is deleted again and
    /// any cleanup failure is logged.
    pub async fn register(
        payload: RegisterUserRequest,
        module: Arc<dyn UsersModule>,
    ) -> UsersServiceResult<RegisterUserResponse> {
        let email = payload.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(UsersServiceError::InvalidEmail);
        }
        if payload.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(UsersServiceError::WeakPassword);
        }
        if [
            &payload.db_host,
            &payload.db_name,
            &payload.db_user,
            &payload.db_password,
            &payload.company_name,
        ]
        .iter()
        .any(|field| field.trim().is_empty())
        {
            return Err(UsersServiceError::MissingDatabaseField);
        }

        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(payload.password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| UsersServiceError::Hash(e.to_string()))?;

        let user = module
            .users_repo()
            .insert_user(email, &password_hash, &json!({"role": "user"}))
            .await
            .map_err(|e| {
                if e.is_unique_violation() {
                    UsersServiceError::EmailTaken
                } else {
                    e.into()
                }
            })?;

        let coords = TenantCoordinates {
            id_user: user.id,
            db_host: payload.db_host.trim().to_string(),
            db_name: payload.db_name.trim().to_string(),
            db_user: payload.db_user.trim().to_string(),
            db_password: payload.db_password,
            company_name: payload.company_name.trim().to_string(),
        };

        if let Err(e) = module.directory_repo().insert(&coords).await {
            if let Err(cleanup) = module.users_repo().delete_user(user.id).await {
                error!("Could not clean up user after failed registry insert: {cleanup}");
            }
            return Err(if e.is_unique_violation() {
                UsersServiceError::CompanyExists
            } else {
                e.into()
            });
        }

        Ok(RegisterUserResponse { user_id: user.id })
    }

    pub async fn list_companies(module: Arc<dyn UsersModule>) -> UsersServiceResult<CompaniesResponse> {
        Ok(CompaniesResponse {
            companies: module.directory_repo().list_companies().await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::directory::repository::MockDirectoryRepository;
    use crate::manager::users::model::AuthUser;
    use crate::manager::users::repository::MockUsersRepository;
    use crate::manager::users::tests::MockUsersModule;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn request() -> RegisterUserRequest {
        RegisterUserRequest {
            email: "dono@empresa.example".to_string(),
            password: "senha-muito-forte".to_string(),
            db_host: "db.empresa.example".to_string(),
            db_name: "empresa".to_string(),
            db_user: "alfred_reader".to_string(),
            db_password: "s3cr3t".to_string(),
            company_name: "Empresa Exemplo".to_string(),
        }
    }

    fn auth_user(id: Uuid) -> AuthUser {
        AuthUser {
            id,
            email: "dono@empresa.example".to_string(),
            created_at: Utc::now(),
        }
    }

    fn module_with(
        users_repo: MockUsersRepository,
        directory_repo: MockDirectoryRepository,
    ) -> Arc<dyn UsersModule> {
        let users_repo: Arc<dyn crate::manager::users::repository::UsersRepository> =
            Arc::new(users_repo);
        let directory_repo: Arc<dyn crate::manager::directory::repository::DirectoryRepository> =
            Arc::new(directory_repo);
        let mut module = MockUsersModule::new();
        module
            .expect_users_repo()
            .returning(move || users_repo.clone());
        module
            .expect_directory_repo()
            .returning(move || directory_repo.clone());
        Arc::new(module)
    }

    #[tokio::test]
    async fn register_creates_user_and_registry_row() {
        let user_id = Uuid::new_v4();

        let mut users_repo = MockUsersRepository::new();
        users_repo
            .expect_insert_user()
            .withf(|email, hash, metadata| {
                email == "dono@empresa.example"
                    && hash.starts_with("$argon2")
                    && metadata["role"] == "user"
            })
            .returning(move |_, _, _| Ok(auth_user(user_id)));
        users_repo.expect_delete_user().never();

        let mut directory_repo = MockDirectoryRepository::new();
        directory_repo
            .expect_insert()
            .withf(move |coords| {
                coords.id_user == user_id && coords.company_name == "Empresa Exemplo"
            })
            .returning(|_| Ok(()));

        let response = UsersService::register(request(), module_with(users_repo, directory_repo))
            .await
            .unwrap();

        assert_eq!(response.user_id, user_id);
    }

    #[tokio::test]
    async fn register_rolls_back_the_user_when_registry_insert_fails() {
        let user_id = Uuid::new_v4();

        let mut users_repo = MockUsersRepository::new();
        users_repo
            .expect_insert_user()
            .returning(move |_, _, _| Ok(auth_user(user_id)));
        users_repo
            .expect_delete_user()
            .withf(move |id| *id == user_id)
            .times(1)
            .returning(|_| Ok(()));

        let mut directory_repo = MockDirectoryRepository::new();
        directory_repo
            .expect_insert()
            .returning(|_| Err(RepositoryError::Custom("registry down".to_string())));

        let result =
            UsersService::register(request(), module_with(users_repo, directory_repo)).await;

        assert!(matches!(result, Err(UsersServiceError::Repository(_))));
    }

    #[tokio::test]
    async fn register_rejects_invalid_input_before_touching_the_store() {
        let module = module_with(MockUsersRepository::new(), MockDirectoryRepository::new());

        let mut bad_email = request();
        bad_email.email = "sem-arroba".to_string();
        assert!(matches!(
            UsersService::register(bad_email, module.clone()).await,
            Err(UsersServiceError::InvalidEmail)
        ));

        let mut weak = request();
        weak.password = "curta".to_string();
        assert!(matches!(
            UsersService::register(weak, module.clone()).await,
            Err(UsersServiceError::WeakPassword)
        ));

        let mut incomplete = request();
        incomplete.db_host = String::new();
        assert!(matches!(
            UsersService::register(incomplete, module).await,
            Err(UsersServiceError::MissingDatabaseField)
        ));
    }
}
