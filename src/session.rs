//! Cookie-carried session tokens.
//!
//! A single shared credential pair guards the service. A successful login
//! mints an HS256 JWT binding the username and an expiry exactly
//! [`SESSION_TTL`] after issuance. The token travels in the `auth_token`
//! cookie and nothing is stored server-side, so logout can only ask the
//! client to drop it.
//!
//! # States
//!
//! ```text
//!              issue (credentials match)
//!  Anonymous ───────────────────────────────▶ Authenticated(username, expiry)
//!      ▲                                              │
//!      └──────── revoke (expired cookie) / expiry ────┘
//! ```
//!
//! Every method that depends on the clock takes `now` explicitly.

use crate::error::{Error, Result};
use crate::utils::http_date;
use axum::http::HeaderMap;
use axum::http::header::COOKIE;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

/// Name of the cookie carrying the token.
pub const SESSION_COOKIE: &str = "auth_token";

/// Lifetime of an issued token.
pub const SESSION_TTL: Duration = Duration::hours(24);

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
struct Claims {
    username: String,
    exp: i64,
    iat: i64,
}

/// The identity bound to a verified token, stored in request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    Authenticated(Identity),
}

/// A freshly minted token and who it belongs to.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub identity: Identity,
}

#[derive(Clone)]
struct Credentials {
    username: String,
    password: String,
}

/// Issues and verifies session tokens.
///
/// Holds the signing key and the shared credential pair; both are fixed at
/// construction and only ever read afterwards.
#[derive(Clone)]
pub struct SessionGate {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    credentials: Option<Credentials>,
}

impl fmt::Debug for SessionGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionGate")
            .field("credentials_configured", &self.credentials.is_some())
            .finish_non_exhaustive()
    }
}

impl SessionGate {
    /// `credentials` is the `(username, password)` pair accepted at login;
    /// `None` means login is unavailable.
    pub fn new(secret: &str, credentials: Option<(String, String)>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            credentials: credentials.map(|(username, password)| Credentials { username, password }),
        }
    }

    /// Check `username`/`password` and mint a token valid until `now + 24h`.
    ///
    /// # Errors
    ///
    /// - [`Error::Configuration`] when no credential pair is configured
    /// - [`Error::Unauthorized`] when either value differs
    pub fn issue(&self, username: &str, password: &str, now: DateTime<Utc>) -> Result<IssuedSession> {
        let expected = self
            .credentials
            .as_ref()
            .ok_or_else(|| Error::missing_config("AUTH_USERNAME/AUTH_PASSWORD"))?;

        if username.as_bytes() != expected.username.as_bytes()
            || password.as_bytes() != expected.password.as_bytes()
        {
            warn!(username, "Login rejected");
            return Err(Error::Unauthorized("invalid credentials".into()));
        }

        // Whole seconds, so the expiry survives the round trip through `exp`.
        let issued_at = now.timestamp();
        let claims = Claims {
            username: username.to_string(),
            exp: issued_at + SESSION_TTL.num_seconds(),
            iat: issued_at,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| Error::Configuration(format!("cannot sign session token: {e}")))?;

        let identity = identity_from(&claims)?;
        info!(username, expires_at = %identity.expires_at, "Session issued");
        Ok(IssuedSession { token, identity })
    }

    /// Check the signature and expiry of `token` as of `now`.
    ///
    /// # Errors
    ///
    /// [`Error::Unauthorized`] for a bad signature, a structurally broken
    /// token, or an expiry at or before `now`.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Identity> {
        // Expiry is compared against the injected clock below.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp"]);

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| Error::Unauthorized(format!("invalid session token: {e}")))?
            .claims;

        if claims.exp <= now.timestamp() {
            return Err(Error::Unauthorized("session expired".into()));
        }
        identity_from(&claims)
    }

    /// Resolve the state of a request from its (optional) token.
    pub fn state(&self, token: Option<&str>, now: DateTime<Utc>) -> SessionState {
        match token.map(|t| self.verify(t, now)) {
            Some(Ok(identity)) => SessionState::Authenticated(identity),
            _ => SessionState::Anonymous,
        }
    }
}

fn identity_from(claims: &Claims) -> Result<Identity> {
    let expires_at = DateTime::from_timestamp(claims.exp, 0)
        .ok_or_else(|| Error::Unauthorized("session expiry out of range".into()))?;
    Ok(Identity {
        username: claims.username.clone(),
        expires_at,
    })
}

/// `Set-Cookie` value delivering `session` to the client.
pub fn session_cookie(session: &IssuedSession) -> String {
    format!(
        "{SESSION_COOKIE}={}; Path=/; Expires={}; Max-Age={}; HttpOnly; Secure; SameSite=Strict",
        session.token,
        http_date(session.identity.expires_at),
        SESSION_TTL.num_seconds()
    )
}

/// `Set-Cookie` value telling the client to drop its session.
///
/// Depends only on `now`; calling it again yields the same instruction.
pub fn revocation_cookie(now: DateTime<Utc>) -> String {
    format!(
        "{SESSION_COOKIE}=; Path=/; Expires={}; Max-Age=0; HttpOnly; Secure; SameSite=Strict",
        http_date(now - Duration::hours(1))
    )
}

/// The session token from the request's `Cookie` headers, if any.
pub fn token_from_headers(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}
