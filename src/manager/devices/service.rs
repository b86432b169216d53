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
use crate::common::services::generate_string_csprng;
use crate::manager::auth::dto::Claims;
use crate::manager::devices::DevicesModule;
use crate::manager::devices::dto::{DevicePublic, DeviceStatusResponse};
use crate::manager::devices::mailer::{
    DeviceEmailParams, build_message, confirmation_email, login_notification_email,
};
use crate::manager::devices::model::{
    DEVICE_STATUS_PENDING, DeviceAttributes, NewLoginEvent, UserDevice,
};
use crate::manager::devices::repository::DevicesRepository;
use axum::http::StatusCode;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::{Level, warn};

const APPROVAL_TOKEN_LEN: usize = 48;

/// Status reported for a device id the gateway has never seen.
const DEVICE_STATUS_UNKNOWN: &str = "unknown";

#[derive(Debug, Error)]
pub enum DevicesServiceError {
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Identificador de dispositivo inválido.")]
    InvalidDeviceId,

    #[error("Dispositivo não autorizado. Confirme o acesso pelo e-mail de segurança.")]
    DeviceNotApproved,

    #[error("Token não encontrado ou já utilizado.")]
    TokenNotFound,
}

impl IntoFriendlyError for DevicesServiceError {
    fn into_friendly_error(self) -> FriendlyError {
        match self {
            Self::InvalidDeviceId => FriendlyError::user_facing(
                Level::DEBUG,
                StatusCode::BAD_REQUEST,
                file!(),
                &self.to_string(),
            ),
            Self::DeviceNotApproved => FriendlyError::user_facing(
                Level::DEBUG,
                StatusCode::FORBIDDEN,
                file!(),
                &self.to_string(),
            ),
            Self::TokenNotFound => FriendlyError::user_facing(
                Level::DEBUG,
                StatusCode::NOT_FOUND,
                file!(),
                &self.to_string(),
            ),
            e => FriendlyError::internal(file!(), e.to_string()),
        }
    }
}

pub struct DevicesService;

type DevicesServiceResult<T> = Result<T, DevicesServiceError>;

impl DevicesService {
    /// Applies the approval state machine to a login report.
    ///
    /// * unknown device: a pending row is created with a fresh single-use
    ///   token and a confirmation email goes out;
    /// * pending device: the token is re-minted only when the client asked
    ///   for a resend or no token is stored, then the confirmation email
    ///   goes out again;
    /// * approved device: mutable attributes and `last_seen_at` are
    ///   refreshed and a login notification goes out.
    ///
    /// Every call appends one login event. Email delivery is best-effort
    /// and never fails the flow.
    pub async fn register_login(
        claims: &Claims,
        attrs: DeviceAttributes,
        resend: bool,
        module: Arc<dyn DevicesModule>,
    ) -> DevicesServiceResult<DeviceStatusResponse> {
        if attrs.device_id.trim().is_empty() {
            return Err(DevicesServiceError::InvalidDeviceId);
        }

        let repo = module.devices_repo();
        let existing = repo
            .get_by_user_device(claims.sub(), &attrs.device_id)
            .await?;

        let (device, requires_confirmation) = match existing {
            None => {
                let token = generate_string_csprng(APPROVAL_TOKEN_LEN);
                let device = repo.upsert_pending(claims.sub(), &attrs, &token).await?;
                Self::record_login_event(&repo, &device, "login").await;
                Self::send_confirmation(claims, &device, module.clone()).await;
                (device, true)
            }
            Some(existing) if existing.is_approved() => {
                let device = repo.touch_last_seen(existing.id, &attrs).await?;
                Self::record_login_event(&repo, &device, "login").await;
                Self::send_login_notification(claims, &device, module.clone()).await;
                (device, false)
            }
            Some(existing) => {
                let device = if resend || existing.approval_token.is_none() {
                    repo.replace_token(existing.id, &generate_string_csprng(APPROVAL_TOKEN_LEN))
                        .await?
                } else {
                    existing
                };
                Self::record_login_event(&repo, &device, "login").await;
                Self::send_confirmation(claims, &device, module.clone()).await;
                (device, true)
            }
        };

        Ok(DeviceStatusResponse {
            status: device.status.clone(),
            requires_confirmation,
            device: Some(DevicePublic::from(&device)),
        })
    }

    /// Poll endpoint companion of `register_login`: reports the current
    /// state without creating rows, optionally re-sending the confirmation
    /// email for a pending device.
    pub async fn check_status(
        claims: &Claims,
        device_id: &str,
        resend: bool,
        module: Arc<dyn DevicesModule>,
    ) -> DevicesServiceResult<DeviceStatusResponse> {
        if device_id.trim().is_empty() {
            return Err(DevicesServiceError::InvalidDeviceId);
        }

        let repo = module.devices_repo();
        let Some(existing) = repo.get_by_user_device(claims.sub(), device_id).await? else {
            return Ok(DeviceStatusResponse {
                status: DEVICE_STATUS_UNKNOWN.to_string(),
                requires_confirmation: true,
                device: None,
            });
        };

        if existing.is_approved() {
            return Ok(DeviceStatusResponse {
                status: existing.status.clone(),
                requires_confirmation: false,
                device: Some(DevicePublic::from(&existing)),
            });
        }

        let device = if resend || existing.approval_token.is_none() {
            let device = repo
                .replace_token(existing.id, &generate_string_csprng(APPROVAL_TOKEN_LEN))
                .await?;
            Self::send_confirmation(claims, &device, module.clone()).await;
            device
        } else {
            existing
        };

        Ok(DeviceStatusResponse {
            status: device.status.clone(),
            requires_confirmation: true,
            device: Some(DevicePublic::from(&device)),
        })
    }

    /// Consumes a single-use approval token. The second call with the same
    /// token fails with `TokenNotFound` because approval clears the column.
    pub async fn confirm(
        token: &str,
        module: Arc<dyn DevicesModule>,
    ) -> DevicesServiceResult<UserDevice> {
        if token.trim().is_empty() {
            return Err(DevicesServiceError::TokenNotFound);
        }

        let repo = module.devices_repo();
        let device = repo
            .get_by_token(token)
            .await?
            .ok_or(DevicesServiceError::TokenNotFound)?;

        let approved = repo.approve(device.id).await?;
        Self::record_login_event(&repo, &approved, "device_confirmed").await;

        // The audit row knows the principal only by id; notification still
        // goes to the address stored on the device owner's token when the
        // confirmation arrived authenticated. The GET confirmation link is
        // an unauthenticated capability, so there may be no claims here.
        Self::notify_owner_about_confirmation(&approved, module.clone()).await;

        Ok(approved)
    }

    /// Gate for sensitive endpoints: the caller must present the device id
    /// header of a device that reached the `approved` state.
    pub async fn require_approved(
        claims: &Claims,
        device_id: Option<&str>,
        module: Arc<dyn DevicesModule>,
    ) -> DevicesServiceResult<()> {
        let Some(device_id) = device_id.map(str::trim).filter(|s| !s.is_empty()) else {
            return Err(DevicesServiceError::DeviceNotApproved);
        };
        let device = module
            .devices_repo()
            .get_by_user_device(claims.sub(), device_id)
            .await?
            .ok_or(DevicesServiceError::DeviceNotApproved)?;
        if !device.is_approved() {
            return Err(DevicesServiceError::DeviceNotApproved);
        }
        Ok(())
    }

    async fn record_login_event(
        repo: &Arc<dyn DevicesRepository>,
        device: &UserDevice,
        event: &str,
    ) {
        let login_event = NewLoginEvent::from_device(
            device,
            json!({"event": event, "status": device.status}),
        );
        if let Err(e) = repo.insert_login_event(&login_event).await {
            warn!("Could not record login event: {e}");
        }
    }

    fn email_params(recipient_name: &str, device: &UserDevice) -> DeviceEmailParams {
        DeviceEmailParams {
            recipient_name: recipient_name.to_string(),
            device_name: device
                .device_name
                .clone()
                .unwrap_or_else(|| String::from("dispositivo desconhecido")),
            ip_address: device
                .ip_address
                .clone()
                .unwrap_or_else(|| String::from("desconhecido")),
            locale: device
                .locale
                .clone()
                .unwrap_or_else(|| String::from("desconhecido")),
            timezone: device
                .timezone
                .clone()
                .unwrap_or_else(|| String::from("desconhecido")),
            occurred_at: Utc::now(),
        }
    }

    async fn send_confirmation(claims: &Claims, device: &UserDevice, module: Arc<dyn DevicesModule>) {
        let Some(recipient) = claims.email() else {
            warn!("Principal has no email address, skipping confirmation email");
            return;
        };
        let Some(token) = device.approval_token.as_deref() else {
            warn!("Pending device without approval token, skipping confirmation email");
            return;
        };
        debug_assert_eq!(device.status, DEVICE_STATUS_PENDING);

        let config = module.config();
        let link = config.security().confirm_link(token);
        match confirmation_email(&Self::email_params(recipient, device), &link)
            .and_then(|payload| build_message(config.mail(), recipient, &payload))
        {
            Ok(message) => {
                module.send(message).await;
            }
            Err(e) => warn!("Could not compose confirmation email: {e}"),
        }
    }

    async fn send_login_notification(
        claims: &Claims,
        device: &UserDevice,
        module: Arc<dyn DevicesModule>,
    ) {
        let Some(recipient) = claims.email() else {
            warn!("Principal has no email address, skipping login notification");
            return;
        };
        let config = module.config();
        match login_notification_email(&Self::email_params(recipient, device))
            .and_then(|payload| build_message(config.mail(), recipient, &payload))
        {
            Ok(message) => {
                module.send(message).await;
            }
            Err(e) => warn!("Could not compose login notification: {e}"),
        }
    }

    async fn notify_owner_about_confirmation(device: &UserDevice, module: Arc<dyn DevicesModule>) {
        let Some(recipient) = module
            .devices_repo()
            .owner_email(device.user_id)
            .await
            .ok()
            .flatten()
        else {
            warn!("Device owner has no known email address, skipping notification");
            return;
        };
        let config = module.config();
        match login_notification_email(&Self::email_params(&recipient, device))
            .and_then(|payload| build_message(config.mail(), &recipient, &payload))
        {
            Ok(message) => {
                module.send(message).await;
            }
            Err(e) => warn!("Could not compose confirmation notification: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::app::config::AppConfig;
    use crate::manager::devices::model::DEVICE_STATUS_APPROVED;
    use crate::manager::devices::repository::MockDevicesRepository;
    use crate::manager::devices::tests::MockDevicesModule;
    use mockall::predicate::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use uuid::Uuid;

    fn claims() -> Claims {
        Claims::new(
            Uuid::new_v4(),
            2_000_000_000,
            1_700_000_000,
            "http://localhost:9999/auth/v1".to_string(),
            "authenticated".to_string(),
            Some("maria@empresa.example".to_string()),
            json!({"role": "user"}),
            serde_json::Value::Null,
        )
    }

    fn device(user_id: Uuid, status: &str, token: Option<&str>, confirmed: bool) -> UserDevice {
        UserDevice {
            id: Uuid::new_v4(),
            user_id,
            device_id: "device-abc".to_string(),
            device_name: Some("Notebook da Maria".to_string()),
            user_agent: Some("Mozilla/5.0".to_string()),
            ip_address: Some("203.0.113.9".to_string()),
            locale: Some("pt-BR".to_string()),
            timezone: Some("America/Sao_Paulo".to_string()),
            screen: Some("1920x1080".to_string()),
            status: status.to_string(),
            approval_token: token.map(str::to_string),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            confirmed_at: confirmed.then(Utc::now),
            last_seen_at: None,
        }
    }

    fn attrs() -> DeviceAttributes {
        DeviceAttributes {
            device_id: "device-abc".to_string(),
            device_name: Some("Notebook da Maria".to_string()),
            user_agent: Some("Mozilla/5.0".to_string()),
            ip_address: Some("203.0.113.9".to_string()),
            locale: Some("pt-BR".to_string()),
            timezone: Some("America/Sao_Paulo".to_string()),
            screen: Some("1920x1080".to_string()),
        }
    }

    fn module_with(repo: MockDevicesRepository, expected_emails: usize) -> Arc<dyn DevicesModule> {
        let repo: Arc<dyn DevicesRepository> = Arc::new(repo);
        let mut module = MockDevicesModule::new();
        module
            .expect_devices_repo()
            .returning(move || repo.clone());
        module
            .expect_config()
            .returning(|| Arc::new(AppConfig::default()));
        module
            .expect_send()
            .times(expected_emails)
            .returning(|_| true);
        Arc::new(module)
    }

    #[tokio::test]
    async fn first_login_creates_pending_device_with_fresh_token() {
        let claims = claims();
        let user_id = claims.sub();

        let mut repo = MockDevicesRepository::new();
        repo.expect_get_by_user_device()
            .with(eq(user_id), eq("device-abc"))
            .returning(|_, _| Ok(None));
        repo.expect_upsert_pending()
            .withf(|_, _, token| token.len() == 48)
            .returning(move |_, _, token| {
                Ok(device(user_id, DEVICE_STATUS_PENDING, Some(token), false))
            });
        repo.expect_insert_login_event().returning(|_| Ok(()));

        let response =
            DevicesService::register_login(&claims, attrs(), false, module_with(repo, 1))
                .await
                .unwrap();

        assert_eq!(response.status, DEVICE_STATUS_PENDING);
        assert!(response.requires_confirmation);
        assert!(response.device.is_some());
    }

    #[tokio::test]
    async fn pending_login_keeps_existing_token_without_resend() {
        let claims = claims();
        let user_id = claims.sub();

        let mut repo = MockDevicesRepository::new();
        repo.expect_get_by_user_device()
            .returning(move |_, _| {
                Ok(Some(device(
                    user_id,
                    DEVICE_STATUS_PENDING,
                    Some("existing-token"),
                    false,
                )))
            });
        repo.expect_replace_token().never();
        repo.expect_insert_login_event().returning(|_| Ok(()));

        let response =
            DevicesService::register_login(&claims, attrs(), false, module_with(repo, 1))
                .await
                .unwrap();

        assert_eq!(response.status, DEVICE_STATUS_PENDING);
        assert!(response.requires_confirmation);
    }

    #[tokio::test]
    async fn pending_login_mints_fresh_token_on_resend() {
        let claims = claims();
        let user_id = claims.sub();

        let mut repo = MockDevicesRepository::new();
        repo.expect_get_by_user_device()
            .returning(move |_, _| {
                Ok(Some(device(
                    user_id,
                    DEVICE_STATUS_PENDING,
                    Some("existing-token"),
                    false,
                )))
            });
        repo.expect_replace_token()
            .withf(|_, token| token.len() == 48 && token != "existing-token")
            .returning(move |_, token| {
                Ok(device(user_id, DEVICE_STATUS_PENDING, Some(token), false))
            });
        repo.expect_insert_login_event().returning(|_| Ok(()));

        let response =
            DevicesService::register_login(&claims, attrs(), true, module_with(repo, 1))
                .await
                .unwrap();

        assert!(response.requires_confirmation);
    }

    #[tokio::test]
    async fn approved_login_refreshes_last_seen_and_notifies() {
        let claims = claims();
        let user_id = claims.sub();

        let mut repo = MockDevicesRepository::new();
        repo.expect_get_by_user_device()
            .returning(move |_, _| Ok(Some(device(user_id, DEVICE_STATUS_APPROVED, None, true))));
        repo.expect_touch_last_seen()
            .returning(move |_, _| {
                let mut updated = device(user_id, DEVICE_STATUS_APPROVED, None, true);
                updated.last_seen_at = Some(Utc::now());
                Ok(updated)
            });
        repo.expect_insert_login_event().returning(|_| Ok(()));

        let response =
            DevicesService::register_login(&claims, attrs(), false, module_with(repo, 1))
                .await
                .unwrap();

        assert_eq!(response.status, DEVICE_STATUS_APPROVED);
        assert!(!response.requires_confirmation);
        assert!(response.device.unwrap().last_seen_at.is_some());
    }

    #[tokio::test]
    async fn empty_device_id_is_rejected() {
        let claims = claims();
        let mut empty = attrs();
        empty.device_id = "  ".to_string();

        let result = DevicesService::register_login(
            &claims,
            empty,
            false,
            module_with(MockDevicesRepository::new(), 0),
        )
        .await;

        assert!(matches!(result, Err(DevicesServiceError::InvalidDeviceId)));
    }

    #[tokio::test]
    async fn check_status_reports_unknown_device_without_creating_state() {
        let claims = claims();

        let mut repo = MockDevicesRepository::new();
        repo.expect_get_by_user_device().returning(|_, _| Ok(None));
        repo.expect_upsert_pending().never();

        let response =
            DevicesService::check_status(&claims, "device-abc", false, module_with(repo, 0))
                .await
                .unwrap();

        assert_eq!(response.status, "unknown");
        assert!(response.requires_confirmation);
        assert!(response.device.is_none());
    }

    #[tokio::test]
    async fn confirm_consumes_the_token() {
        let claims = claims();
        let user_id = claims.sub();

        let mut repo = MockDevicesRepository::new();
        repo.expect_get_by_token()
            .with(eq("valid-token"))
            .returning(move |token| {
                Ok(Some(device(user_id, DEVICE_STATUS_PENDING, Some(token), false)))
            });
        repo.expect_approve().returning(move |_| {
            let mut approved = device(user_id, DEVICE_STATUS_APPROVED, None, true);
            approved.last_seen_at = Some(Utc::now());
            Ok(approved)
        });
        repo.expect_insert_login_event()
            .withf(|event| event.metadata["event"] == "device_confirmed")
            .returning(|_| Ok(()));
        repo.expect_owner_email()
            .returning(|_| Ok(Some("maria@empresa.example".to_string())));

        let approved = DevicesService::confirm("valid-token", module_with(repo, 1))
            .await
            .unwrap();

        assert!(approved.is_approved());
        assert_eq!(approved.approval_token, None);
    }

    #[tokio::test]
    async fn confirm_with_unknown_token_fails() {
        let mut repo = MockDevicesRepository::new();
        repo.expect_get_by_token().returning(|_| Ok(None));

        let result = DevicesService::confirm("stale-token", module_with(repo, 0)).await;

        assert!(matches!(result, Err(DevicesServiceError::TokenNotFound)));
    }

    #[tokio::test]
    async fn require_approved_gates_on_header_record_and_state() {
        let claims = claims();
        let user_id = claims.sub();

        // Missing header.
        let result = DevicesService::require_approved(
            &claims,
            None,
            module_with(MockDevicesRepository::new(), 0),
        )
        .await;
        assert!(matches!(result, Err(DevicesServiceError::DeviceNotApproved)));

        // Unknown device.
        let mut repo = MockDevicesRepository::new();
        repo.expect_get_by_user_device().returning(|_, _| Ok(None));
        let result =
            DevicesService::require_approved(&claims, Some("device-abc"), module_with(repo, 0))
                .await;
        assert!(matches!(result, Err(DevicesServiceError::DeviceNotApproved)));

        // Pending device.
        let mut repo = MockDevicesRepository::new();
        repo.expect_get_by_user_device().returning(move |_, _| {
            Ok(Some(device(user_id, DEVICE_STATUS_PENDING, Some("tok"), false)))
        });
        let result =
            DevicesService::require_approved(&claims, Some("device-abc"), module_with(repo, 0))
                .await;
        assert!(matches!(result, Err(DevicesServiceError::DeviceNotApproved)));

        // Approved device.
        let mut repo = MockDevicesRepository::new();
        repo.expect_get_by_user_device()
            .returning(move |_, _| Ok(Some(device(user_id, DEVICE_STATUS_APPROVED, None, true))));
        assert!(
            DevicesService::require_approved(&claims, Some("device-abc"), module_with(repo, 0))
                .await
                .is_ok()
        );
    }
}
