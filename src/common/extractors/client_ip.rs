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

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{Extensions, HeaderMap, request::Parts},
};
use std::net::SocketAddr;

/// Proxy headers consulted for the caller address, most specific first.
const IP_HEADERS: [&str; 4] = [
    "x-forwarded-for",
    "cf-connecting-ip",
    "x-real-ip",
    "x-client-ip",
];

pub fn ip_from_parts(headers: &HeaderMap, extensions: &Extensions) -> String {
    for header in IP_HEADERS {
        if let Some(value) = headers
            .get(header)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            return value.to_string();
        }
    }

    if let Some(ConnectInfo(addr)) = extensions.get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    String::from("unknown")
}

pub struct ClientIp(pub String);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientIp(ip_from_parts(&parts.headers, &parts.extensions)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn forwarded_for_takes_first_element() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.9, 10.0.0.1".parse().unwrap());
        headers.insert("x-real-ip", "198.51.100.7".parse().unwrap());
        assert_eq!(
            ip_from_parts(&headers, &Extensions::new()),
            "203.0.113.9".to_string()
        );
    }

    #[test]
    fn header_precedence_follows_declared_order() {
        let mut headers = HeaderMap::new();
        headers.insert("x-client-ip", "192.0.2.4".parse().unwrap());
        headers.insert("cf-connecting-ip", "198.51.100.7".parse().unwrap());
        assert_eq!(
            ip_from_parts(&headers, &Extensions::new()),
            "198.51.100.7".to_string()
        );
    }

    #[test]
    fn falls_back_to_connect_info_then_unknown() {
        let mut extensions = Extensions::new();
        extensions.insert(ConnectInfo::<SocketAddr>("10.1.2.3:9000".parse().unwrap()));
        assert_eq!(
            ip_from_parts(&HeaderMap::new(), &extensions),
            "10.1.2.3".to_string()
        );
        assert_eq!(
            ip_from_parts(&HeaderMap::new(), &Extensions::new()),
            "unknown".to_string()
        );
    }
}
