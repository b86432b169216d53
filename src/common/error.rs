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

use crate::common::dto::ErrorResponse;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sqlx::Error;
use sqlx::migrate::MigrateError;
use thiserror::Error;
use tracing::Level;
use tracing::event;

/// An enumeration representing different types of errors that can occur.
///
/// # Variants
///
/// * `UserFacing(StatusCode, String, String)`:
///   This variant is designed to represent errors that are intended to be displayed
///   to the caller. It contains:
///   - `StatusCode`: An HTTP status code indicating the type of error.
///   - `String`: The source location that raised the error.
///   - `String`: A human-readable error message.
///
/// * `Internal(String, String)`:
///   This variant represents internal errors that are not meant to be user-facing.
///   It contains the source location and a description of the internal error.
///
/// # Error Message Localization
///
/// User-facing messages are localized for end users' understanding. The `Internal`
/// variant is always masked behind a generic Portuguese message:
/// "Erro interno inesperado."
#[derive(Debug, Error, Clone)]
pub enum FriendlyError {
    #[error("{2}")]
    UserFacing(StatusCode, String, String),
    #[error("Erro interno inesperado.")]
    Internal(String, String),
}

impl FriendlyError {
    pub fn user_facing(severity: Level, status: StatusCode, loc: &str, message: &str) -> Self {
        Self::UserFacing(status, loc.to_string(), message.to_string()).trace(severity)
    }
    pub fn internal(loc: &str, message: String) -> Self {
        Self::Internal(loc.to_string(), message).trace(Level::ERROR)
    }

    /// Logs the error information associated with the current `FriendlyError` instance
    /// at the specified severity level using the `tracing` crate.
    ///
    /// Returns the current instance unchanged so that further method chaining can be
    /// performed if necessary.
    fn trace(self, severity: Level) -> Self {
        match &self {
            FriendlyError::UserFacing(status, loc, message) => match severity {
                Level::ERROR => {
                    event!(
                        Level::ERROR,
                        "User-facing error: http-status={status} location={loc}, message={message}",
                    );
                }
                Level::WARN => {
                    event!(
                        Level::WARN,
                        "User-facing error: http-status={status} location={loc}, message={message}",
                    );
                }
                Level::INFO => {
                    event!(
                        Level::INFO,
                        "User-facing error: http-status={status} location={loc}, message={message}",
                    );
                }
                Level::DEBUG => {
                    event!(
                        Level::DEBUG,
                        "User-facing error: http-status={status} location={loc}, message={message}",
                    );
                }
                Level::TRACE => {
                    event!(
                        Level::TRACE,
                        "User-facing error: http-status={status} location={loc}, message={message}",
                    );
                }
            },
            FriendlyError::Internal(loc, message) => match severity {
                Level::ERROR => {
                    event!(
                        Level::ERROR,
                        "Internal error: location={loc} message={message}"
                    );
                }
                Level::WARN => {
                    event!(Level::WARN, "Internal error: location={loc} message={message}");
                }
                Level::INFO => {
                    event!(Level::INFO, "Internal error: location={loc} message={message}");
                }
                Level::DEBUG => {
                    event!(
                        Level::DEBUG,
                        "Internal error: location={loc} message={message}"
                    );
                }
                Level::TRACE => {
                    event!(
                        Level::TRACE,
                        "Internal error: location={loc} message={message}"
                    );
                }
            },
        }
        self
    }
}

impl IntoResponse for FriendlyError {
    fn into_response(self) -> Response {
        match self {
            FriendlyError::UserFacing(status, _, message) => ErrorResponse {
                status_code: status,
                error: message,
            }
            .into_response(),
            FriendlyError::Internal(_, _) => ErrorResponse {
                status_code: StatusCode::INTERNAL_SERVER_ERROR,
                error: String::from("Erro interno inesperado."),
            }
            .into_response(),
        }
    }
}

/// Conversion from a service-level error into the response-ready
/// `FriendlyError`. Each service error enum decides which of its variants
/// are safe to show to the caller.
pub trait IntoFriendlyError {
    fn into_friendly_error(self) -> FriendlyError;
}

/// Represents errors that can occur while interacting with a database.
///
/// # Notes
/// - It is compatible with the `thiserror` crate to provide human-readable error
///   messages via the `Display` implementation.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migrate error: {0}")]
    Migrate(#[from] MigrateError),

    #[error("InvalidInput error: {0}")]
    InvalidInput(String),

    #[error("Custom error: {0}")]
    Custom(String),

    #[error("RwLockReadGuard error: {0}")]
    RwLockReadGuard(String),

    #[error("RwLockWriteGuard error: {0}")]
    RwLockWriteGuard(String),
}

impl RepositoryError {
    pub fn is_unique_violation(&self) -> bool {
        if let RepositoryError::Database(sqlxe) = self
            && let Error::Database(database_error) = sqlxe
            && database_error.is_unique_violation()
        {
            return true;
        }
        false
    }
    pub fn is_row_not_found(&self) -> bool {
        matches!(self, RepositoryError::Database(Error::RowNotFound))
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;
