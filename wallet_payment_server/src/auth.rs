//! Caller identity as asserted by the upstream authentication proxy.
//!
//! The proxy authenticates end users and services, then forwards the request with two headers:
//! * `X-Auth-User-Id` - the numeric id of the authenticated user.
//! * `X-Auth-Roles` - a comma-separated list of roles (`user`, `admin`, `checkout`).
//!
//! If `WPG_AUTH_PROXY_TOKEN` is configured, the proxy must also send the shared token in `X-Auth-Proxy-Token`.
//! The [`IdentityMiddlewareFactory`](crate::middleware::IdentityMiddlewareFactory) validates these headers and
//! stores the resulting [`Identity`] in the request extensions, where handlers pick it up as an extractor.
use std::{
    fmt::Display,
    future::{ready, Ready},
    str::FromStr,
};

use actix_web::{dev::Payload, http::header::HeaderMap, FromRequest, HttpMessage, HttpRequest};
use log::*;
use serde::{Deserialize, Serialize};

use crate::errors::{AuthError, ServerError};

pub const USER_ID_HEADER: &str = "X-Auth-User-Id";
pub const ROLES_HEADER: &str = "X-Auth-Roles";
pub const PROXY_TOKEN_HEADER: &str = "X-Auth-Proxy-Token";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A wallet owner. Can read their own wallet and start top-ups.
    User,
    /// Back-office staff. Can adjust any wallet and review the audit trail.
    Admin,
    /// The checkout service, which debits wallets for purchases.
    Checkout,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Admin => write!(f, "admin"),
            Role::Checkout => write!(f, "checkout"),
        }
    }
}

impl FromStr for Role {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            "checkout" => Ok(Role::Checkout),
            other => Err(AuthError::InvalidIdentity(format!("Unknown role: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: i64,
    pub roles: Vec<Role>,
}

impl Identity {
    pub fn new(user_id: i64, roles: &[Role]) -> Self {
        Self { user_id, roles: roles.to_vec() }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Reads the identity headers. Unknown roles are ignored rather than rejected, so that the proxy can introduce
    /// roles for other services without breaking this one.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, AuthError> {
        let user_id = headers
            .get(USER_ID_HEADER)
            .ok_or(AuthError::MissingIdentity)?
            .to_str()
            .map_err(|e| AuthError::InvalidIdentity(e.to_string()))?
            .trim()
            .parse::<i64>()
            .map_err(|e| AuthError::InvalidIdentity(format!("{USER_ID_HEADER} must be numeric. {e}")))?;
        if user_id <= 0 {
            return Err(AuthError::InvalidIdentity(format!("{user_id} is not a valid user id")));
        }
        let roles = match headers.get(ROLES_HEADER) {
            Some(v) => v
                .to_str()
                .map_err(|e| AuthError::InvalidIdentity(e.to_string()))?
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .filter_map(|s| {
                    s.parse::<Role>()
                        .map_err(|e| debug!("🛡️ Ignoring role in identity headers. {e}"))
                        .ok()
                })
                .collect(),
            None => vec![],
        };
        Ok(Self { user_id, roles })
    }
}

impl FromRequest for Identity {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let identity = req.extensions().get::<Identity>().cloned().ok_or_else(|| {
            warn!("💻️ No identity found in request extensions. Is the identity middleware installed?");
            ServerError::AuthenticationError(AuthError::MissingIdentity)
        });
        ready(identity)
    }
}
