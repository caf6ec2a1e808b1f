//! Admin session tokens and the write guard.
//!
//! # Responsibility
//! - Issue HS256-signed session tokens for the single admin.
//! - Answer "may this caller write" for repository and upload paths.
//!
//! # Invariants
//! - Tokens expire 24 hours after issue.
//! - A token authorizes writes only when its signature verifies, it has not
//!   expired, and it carries `loggedIn: true`.
//! - Passwords and tokens are never logged.

use crate::config::{AdminCredentials, SiteConfig};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const SESSION_COOKIE_NAME: &str = "session";
pub const SESSION_TTL_SECS: i64 = 60 * 60 * 24;
const MAX_TOKEN_LEN: usize = 4096;

/// Claims carried by an admin session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
    pub email: String,
    pub logged_in: bool,
    /// Issued-at, Unix seconds.
    pub iat: i64,
    /// Expiry, Unix seconds.
    pub exp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    CredentialsNotConfigured,
    InvalidCredentials,
    MalformedToken,
    InvalidSignature,
    Expired,
    Signing(String),
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CredentialsNotConfigured => {
                write!(f, "admin credentials are not configured (ADMIN_EMAIL/ADMIN_PASSWORD)")
            }
            Self::InvalidCredentials => write!(f, "invalid credentials"),
            Self::MalformedToken => write!(f, "session token is malformed"),
            Self::InvalidSignature => write!(f, "session token signature mismatch"),
            Self::Expired => write!(f, "session token has expired"),
            Self::Signing(message) => write!(f, "session token signing failed: {message}"),
        }
    }
}

impl Error for SessionError {}

/// Boolean authorization check consulted before any write.
pub trait SessionGuard: Send + Sync {
    fn is_authorized(&self, token: Option<&str>) -> bool;
}

/// HS256 key pair derived from the session secret.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SessionKeys {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_ref()),
            decoding: DecodingKey::from_secret(secret.as_ref()),
        }
    }

    /// Signs a logged-in token for `email` valid for 24 hours from `issued_at`.
    pub fn issue(&self, email: &str, issued_at: i64) -> Result<String, SessionError> {
        let claims = SessionClaims {
            email: email.to_string(),
            logged_in: true,
            iat: issued_at,
            exp: issued_at + SESSION_TTL_SECS,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|err| SessionError::Signing(err.to_string()))
    }

    /// Verifies signature and expiry against the system clock.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, SessionError> {
        if token.len() > MAX_TOKEN_LEN {
            return Err(SessionError::MalformedToken);
        }
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;

        decode::<SessionClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => SessionError::Expired,
                ErrorKind::InvalidSignature => SessionError::InvalidSignature,
                _ => SessionError::MalformedToken,
            })
    }
}

impl SessionGuard for SessionKeys {
    fn is_authorized(&self, token: Option<&str>) -> bool {
        let Some(token) = token else {
            return false;
        };
        match self.verify(token) {
            Ok(claims) => claims.logged_in,
            Err(err) => {
                warn!("event=session_verify module=session status=denied reason={err}");
                false
            }
        }
    }
}

/// Single-admin login plus token verification.
pub struct AdminAuthenticator {
    keys: SessionKeys,
    admin: Option<AdminCredentials>,
    secure_cookie: bool,
}

impl AdminAuthenticator {
    pub fn new(keys: SessionKeys, admin: Option<AdminCredentials>, secure_cookie: bool) -> Self {
        Self {
            keys,
            admin,
            secure_cookie,
        }
    }

    pub fn from_config(config: &SiteConfig) -> Self {
        Self::new(
            SessionKeys::new(config.session_secret.as_bytes()),
            config.admin.clone(),
            config.production,
        )
    }

    pub fn keys(&self) -> &SessionKeys {
        &self.keys
    }

    /// Checks credentials and issues a session token.
    pub fn login(&self, email: &str, password: &str, now: i64) -> Result<String, SessionError> {
        let admin = self
            .admin
            .as_ref()
            .ok_or(SessionError::CredentialsNotConfigured)?;
        let email_ok = digest_eq(email.trim(), admin.email.trim());
        let password_ok = digest_eq(password, &admin.password);
        if !(email_ok && password_ok) {
            warn!("event=admin_login module=session status=denied");
            return Err(SessionError::InvalidCredentials);
        }
        let token = self.keys.issue(email.trim(), now)?;
        info!("event=admin_login module=session status=ok");
        Ok(token)
    }

    /// `Set-Cookie` value carrying the session token.
    pub fn session_cookie(&self, token: &str) -> String {
        let mut cookie = format!(
            "{SESSION_COOKIE_NAME}={token}; HttpOnly; SameSite=Lax; Max-Age={SESSION_TTL_SECS}; Path=/"
        );
        if self.secure_cookie {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

impl SessionGuard for AdminAuthenticator {
    fn is_authorized(&self, token: Option<&str>) -> bool {
        self.keys.is_authorized(token)
    }
}

fn digest_eq(left: &str, right: &str) -> bool {
    Sha256::digest(left.as_bytes()) == Sha256::digest(right.as_bytes())
}
