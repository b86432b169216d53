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

use crate::manager::app::config::MailConfig;
use chrono::{DateTime, Utc};
use handlebars::Handlebars;
use lettre::{
    Message,
    address::AddressError,
    message::{Mailbox, MultiPart},
};
use serde_json::json;

/// Rendered email parts handed to the transport. Composition is pure; the
/// transport decides whether anything actually leaves the process.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailPayload {
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct DeviceEmailParams {
    pub recipient_name: String,
    pub device_name: String,
    pub ip_address: String,
    pub locale: String,
    pub timezone: String,
    pub occurred_at: DateTime<Utc>,
}

const CONFIRMATION_HTML: &str = r##"
<p style="font-weight: bold; margin-bottom: 25px;">
    Olá, {{recipient_name}}!
</p>
<p>
    Detectamos um acesso de um novo dispositivo à sua conta:
</p>
<ul>
    <li>Dispositivo: {{device_name}}</li>
    <li>Endereço IP: {{ip_address}}</li>
    <li>Idioma: {{locale}}</li>
    <li>Fuso horário: {{timezone}}</li>
    <li>Data: {{occurred_at}}</li>
</ul>
<p>
    Para liberar o acesso, confirme o dispositivo pelo link abaixo:<br>
    <a href="{{confirm_link}}">{{confirm_link}}</a>
</p>
<p>
    Se você não reconhece este acesso, ignore este e-mail.
</p>
"##;

const LOGIN_NOTIFICATION_HTML: &str = r##"
<p style="font-weight: bold; margin-bottom: 25px;">
    Olá, {{recipient_name}}!
</p>
<p>
    Registramos um novo acesso à sua conta com um dispositivo já confirmado:
</p>
<ul>
    <li>Dispositivo: {{device_name}}</li>
    <li>Endereço IP: {{ip_address}}</li>
    <li>Idioma: {{locale}}</li>
    <li>Fuso horário: {{timezone}}</li>
    <li>Data: {{occurred_at}}</li>
</ul>
<p>
    Se você não reconhece este acesso, troque sua senha imediatamente.
</p>
"##;

pub fn confirmation_email(
    params: &DeviceEmailParams,
    confirm_link: &str,
) -> Result<EmailPayload, String> {
    let handlebars = Handlebars::new();
    let context = json!({
        "recipient_name": params.recipient_name,
        "device_name": params.device_name,
        "ip_address": params.ip_address,
        "locale": params.locale,
        "timezone": params.timezone,
        "occurred_at": params.occurred_at.format("%d/%m/%Y %H:%M UTC").to_string(),
        "confirm_link": confirm_link,
    });
    let html = handlebars
        .render_template(CONFIRMATION_HTML, &context)
        .map_err(|e| e.to_string())?;
    let text = format!(
        "Olá, {}!\n\nDetectamos um acesso de um novo dispositivo à sua conta.\n\
         Dispositivo: {}\nEndereço IP: {}\nIdioma: {}\nFuso horário: {}\nData: {}\n\n\
         Para liberar o acesso, confirme o dispositivo pelo link:\n{}\n\n\
         Se você não reconhece este acesso, ignore este e-mail.\n",
        params.recipient_name,
        params.device_name,
        params.ip_address,
        params.locale,
        params.timezone,
        params.occurred_at.format("%d/%m/%Y %H:%M UTC"),
        confirm_link,
    );
    Ok(EmailPayload {
        subject: String::from("Confirme seu novo dispositivo"),
        html,
        text,
    })
}

pub fn login_notification_email(params: &DeviceEmailParams) -> Result<EmailPayload, String> {
    let handlebars = Handlebars::new();
    let context = json!({
        "recipient_name": params.recipient_name,
        "device_name": params.device_name,
        "ip_address": params.ip_address,
        "locale": params.locale,
        "timezone": params.timezone,
        "occurred_at": params.occurred_at.format("%d/%m/%Y %H:%M UTC").to_string(),
    });
    let html = handlebars
        .render_template(LOGIN_NOTIFICATION_HTML, &context)
        .map_err(|e| e.to_string())?;
    let text = format!(
        "Olá, {}!\n\nRegistramos um novo acesso à sua conta com um dispositivo já confirmado.\n\
         Dispositivo: {}\nEndereço IP: {}\nIdioma: {}\nFuso horário: {}\nData: {}\n\n\
         Se você não reconhece este acesso, troque sua senha imediatamente.\n",
        params.recipient_name,
        params.device_name,
        params.ip_address,
        params.locale,
        params.timezone,
        params.occurred_at.format("%d/%m/%Y %H:%M UTC"),
    );
    Ok(EmailPayload {
        subject: String::from("Novo acesso à sua conta"),
        html,
        text,
    })
}

/// Assembles the multipart message for the SMTP transport.
pub fn build_message(
    mail: &MailConfig,
    to: &str,
    payload: &EmailPayload,
) -> Result<Message, String> {
    Message::builder()
        .from(Mailbox::new(
            Some(mail.default_from_name().to_owned()),
            mail.default_from()
                .parse()
                .map_err(|e: AddressError| e.to_string())?,
        ))
        .to(Mailbox::new(
            None,
            to.parse().map_err(|e: AddressError| e.to_string())?,
        ))
        .subject(payload.subject.clone())
        .multipart(MultiPart::alternative_plain_html(
            payload.text.clone(),
            payload.html.clone(),
        ))
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn params() -> DeviceEmailParams {
        DeviceEmailParams {
            recipient_name: "maria@empresa.example".to_string(),
            device_name: "Notebook da Maria".to_string(),
            ip_address: "203.0.113.9".to_string(),
            locale: "pt-BR".to_string(),
            timezone: "America/Sao_Paulo".to_string(),
            occurred_at: DateTime::parse_from_rfc3339("2025-01-15T12:30:00Z")
                .unwrap()
                .with_timezone(&Utc),
        }
    }

    #[test]
    fn confirmation_email_embeds_the_link_in_both_parts() {
        let link = "http://localhost:5173/confirm-device?token=tok123";
        let payload = confirmation_email(&params(), link).unwrap();
        assert_eq!(payload.subject, "Confirme seu novo dispositivo");
        assert!(payload.html.contains(link));
        assert!(payload.text.contains(link));
        assert!(payload.html.contains("Notebook da Maria"));
    }

    #[test]
    fn login_notification_reports_device_details() {
        let payload = login_notification_email(&params()).unwrap();
        assert_eq!(payload.subject, "Novo acesso à sua conta");
        for part in [&payload.html, &payload.text] {
            assert!(part.contains("203.0.113.9"));
            assert!(part.contains("America/Sao_Paulo"));
            assert!(part.contains("15/01/2025 12:30 UTC"));
        }
    }

    #[test]
    fn build_message_accepts_valid_addresses() {
        let payload = login_notification_email(&params()).unwrap();
        let mail = MailConfig::default();
        assert!(build_message(&mail, "maria@empresa.example", &payload).is_ok());
        assert!(build_message(&mail, "not-an-address", &payload).is_err());
    }
}
