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

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use uuid::Uuid;

/// Represents the structure of the claims contained in the identity
/// provider's JSON Web Tokens.
///
/// # Fields:
///
/// * `sub` - The subject of the token: the principal's unique identifier.
///
/// * `exp` - The expiration timestamp of the token in UNIX time.
///
/// * `iat` - The issued-at timestamp of the token in UNIX time.
///
/// * `iss` - The issuer of the token, the identity provider's URL.
///
/// * `aud` - The audience for the token; the provider issues end-user tokens
///   with the audience `authenticated`.
///
/// * `email` - The principal's email address, when the provider embeds it.
///
/// * `app_metadata` / `user_metadata` - Arbitrary JSON maps maintained by
///   the provider. Role assignments live under the `role` / `roles` keys of
///   either map.
///
/// # Usage:
///
/// This struct is used to validate and decode incoming bearer tokens and to
/// derive the principal's role set for authorisation decisions.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct Claims {
    sub: Uuid,
    exp: usize,
    #[serde(default)]
    iat: usize,
    iss: String,
    aud: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    app_metadata: Value,
    #[serde(default)]
    user_metadata: Value,
}

impl Claims {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sub: Uuid,
        exp: usize,
        iat: usize,
        iss: String,
        aud: String,
        email: Option<String>,
        app_metadata: Value,
        user_metadata: Value,
    ) -> Self {
        Self {
            sub,
            exp,
            iat,
            iss,
            aud,
            email,
            app_metadata,
            user_metadata,
        }
    }

    /// Attempts to create an instance of the struct by decoding and
    /// validating a JWT.
    ///
    /// # Parameters
    ///
    /// - `s`: The JWT string token to decode and validate.
    /// - `decoding_key`: The HS256 secret shared with the identity provider.
    /// - `iss`: The expected issuer of the token.
    /// - `aud`: The expected audience of the token.
    ///
    /// # Errors
    ///
    /// Returns an error with the message `"Invalid token"` if decoding fails
    /// or the token is invalid.
    pub fn from_token(s: &str, decoding_key: &[u8], iss: &str, aud: &str) -> Result<Self, String> {
        let mut validator = Validation::new(Algorithm::HS256);
        validator.set_issuer(&[iss]);
        validator.set_audience(&[aud]);
        validator.set_required_spec_claims(&["sub", "exp", "iss", "aud"]);
        Ok(
            decode::<Claims>(s, &DecodingKey::from_secret(decoding_key), &validator)
                .map_err(|_| String::from("Invalid token"))?
                .claims,
        )
    }

    /// Converts the current instance into a signed token string.
    ///
    /// # Errors
    ///
    /// Returns an `Err` with the message `"Could not encode token"` if the
    /// token encoding fails.
    pub fn to_token(&self, encoding_key: &[u8]) -> Result<String, String> {
        encode(
            &Header::default(),
            &self,
            &EncodingKey::from_secret(encoding_key),
        )
        .map_err(|_| String::from("Could not encode token"))
    }

    pub fn sub(&self) -> Uuid {
        self.sub
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Derives the principal's role set, seeded with `authenticated`.
    ///
    /// Walks `app_metadata.role`, `user_metadata.role`, `app_metadata.roles`,
    /// `user_metadata.roles` in that order and unions the findings: a string
    /// contributes itself, an array of strings its elements, any other shape
    /// is ignored.
    pub fn roles(&self) -> HashSet<String> {
        self.roles_seeded(["authenticated"])
    }

    pub fn roles_seeded<const N: usize>(&self, seed: [&str; N]) -> HashSet<String> {
        let mut roles: HashSet<String> = seed.iter().map(|s| s.to_string()).collect();
        for (source, key) in [
            (&self.app_metadata, "role"),
            (&self.user_metadata, "role"),
            (&self.app_metadata, "roles"),
            (&self.user_metadata, "roles"),
        ] {
            match source.get(key) {
                Some(Value::String(role)) => {
                    roles.insert(role.clone());
                }
                Some(Value::Array(items)) => {
                    for item in items {
                        if let Value::String(role) = item {
                            roles.insert(role.clone());
                        }
                    }
                }
                _ => {}
            }
        }
        roles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn claims(app_metadata: Value, user_metadata: Value) -> Claims {
        Claims::new(
            Uuid::new_v4(),
            2_000_000_000,
            1_700_000_000,
            "http://localhost:9999/auth/v1".to_string(),
            "authenticated".to_string(),
            Some("user@empresa.example".to_string()),
            app_metadata,
            user_metadata,
        )
    }

    #[test]
    fn roles_always_contain_authenticated() {
        let claims = claims(Value::Null, Value::Null);
        assert_eq!(
            claims.roles(),
            HashSet::from(["authenticated".to_string()])
        );
    }

    #[test]
    fn roles_union_all_four_locations() {
        let claims = claims(
            json!({"role": "admin", "roles": ["ops"]}),
            json!({"role": "user", "roles": ["viewer", "editor"]}),
        );
        let roles = claims.roles();
        for expected in ["authenticated", "admin", "ops", "user", "viewer", "editor"] {
            assert!(roles.contains(expected), "missing role {expected}");
        }
    }

    #[test]
    fn non_string_role_shapes_are_ignored() {
        let claims = claims(
            json!({"role": 42, "roles": [true, {"x": 1}, "analyst"]}),
            json!({"roles": "solo"}),
        );
        let roles = claims.roles();
        assert!(roles.contains("analyst"));
        assert!(roles.contains("solo"));
        assert_eq!(roles.len(), 3);
    }

    #[test]
    fn token_round_trip() {
        let claims = claims(json!({"role": "admin"}), Value::Null);
        let token = claims.to_token(b"test_jwt_secret").unwrap();
        let decoded = Claims::from_token(
            &token,
            b"test_jwt_secret",
            "http://localhost:9999/auth/v1",
            "authenticated",
        )
        .unwrap();
        assert_eq!(decoded, claims);
    }

    #[test]
    fn token_with_wrong_secret_is_rejected() {
        let claims = claims(Value::Null, Value::Null);
        let token = claims.to_token(b"test_jwt_secret").unwrap();
        assert!(
            Claims::from_token(
                &token,
                b"other_secret",
                "http://localhost:9999/auth/v1",
                "authenticated",
            )
            .is_err()
        );
    }
}
