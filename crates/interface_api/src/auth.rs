//! Authentication and authorization

use std::str::FromStr;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use core_kernel::{Actor, Permission, PersonId, UserId};

/// Role carried by superuser sessions
pub const SUPERUSER_ROLE: &str = "superuser";

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Person linked to the account, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person: Option<String>,
    /// Staff account
    #[serde(default)]
    pub staff: bool,
    /// Permission strings, plus `superuser` for superusers
    pub roles: Vec<String>,
    /// Expiration timestamp
    pub exp: i64,
    /// Issued at timestamp
    pub iat: i64,
}

impl Claims {
    /// Builds claims for an actor, valid for `expiration_secs`
    pub fn for_actor(actor: &Actor, expiration_secs: u64) -> Self {
        let now = Utc::now();
        let exp = now + Duration::seconds(expiration_secs as i64);

        let mut roles: Vec<String> = actor.permissions.iter().map(|p| p.as_str().to_string()).collect();
        if actor.is_superuser {
            roles.push(SUPERUSER_ROLE.to_string());
        }

        Self {
            sub: actor.user_id.as_uuid().to_string(),
            person: actor.person_id.map(|p| p.as_uuid().to_string()),
            staff: actor.is_staff,
            roles,
            exp: exp.timestamp(),
            iat: now.timestamp(),
        }
    }

    /// Rebuilds the actor the token was issued for
    ///
    /// Unknown roles are skipped so that tokens issued before a permission
    /// was retired keep working.
    pub fn to_actor(&self) -> Result<Actor, AuthError> {
        let user_id = UserId::from_str(&self.sub).map_err(|_| AuthError::InvalidToken)?;
        let person_id = match &self.person {
            Some(raw) => Some(PersonId::from_str(raw).map_err(|_| AuthError::InvalidToken)?),
            None => None,
        };

        let mut is_superuser = false;
        let mut permissions = std::collections::BTreeSet::new();
        for role in &self.roles {
            if role == SUPERUSER_ROLE {
                is_superuser = true;
                continue;
            }
            match Permission::from_str(role) {
                Ok(permission) => {
                    permissions.insert(permission);
                }
                Err(_) => warn!(role = %role, "Ignoring unknown role in token"),
            }
        }

        Ok(Actor {
            user_id,
            person_id,
            is_staff: self.staff || is_superuser,
            is_superuser,
            permissions,
        })
    }
}

/// Auth errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Invalid identity proxy credentials")]
    InvalidProxySecret,
}

/// Creates a session token for an actor
///
/// # Arguments
///
/// * `actor` - The signed-in user
/// * `secret` - JWT secret key
/// * `expiration_secs` - Token validity in seconds
pub fn create_token(actor: &Actor, secret: &str, expiration_secs: u64) -> Result<String, AuthError> {
    let claims = Claims::for_actor(actor, expiration_secs);

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AuthError::InvalidToken)
}

/// Validates a JWT token
///
/// # Arguments
///
/// * `token` - The JWT token to validate
/// * `secret` - JWT secret key
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::InvalidToken,
    })?;

    Ok(token_data.claims)
}

/// Compares the identity proxy header against the configured secret
///
/// Runs in time independent of where the first mismatch is.
pub fn verify_proxy_secret(presented: Option<&str>, expected: &str) -> Result<(), AuthError> {
    let presented = presented.ok_or(AuthError::InvalidProxySecret)?;
    if expected.is_empty() || presented.len() != expected.len() {
        return Err(AuthError::InvalidProxySecret);
    }
    let diff = presented
        .bytes()
        .zip(expected.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b));
    if diff == 0 {
        Ok(())
    } else {
        Err(AuthError::InvalidProxySecret)
    }
}
