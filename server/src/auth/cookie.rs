//! Signed session cookies.
//!
//! The cookie value is `<token>.<signature>` where the signature is
//! HMAC-SHA256 of the token under the session secret, base64url encoded.
//! A value whose signature does not verify is treated as no cookie at all.

use axum::http::header::COOKIE;
use axum::http::HeaderMap;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::Duration;

use super::AuthError;

type HmacSha256 = Hmac<Sha256>;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "feedback_session";

#[derive(Clone)]
pub struct CookieSigner {
    mac: HmacSha256,
    secure: bool,
}

impl CookieSigner {
    /// `secure` adds the `Secure` attribute, for deployments behind TLS.
    pub fn new(secret: &[u8], secure: bool) -> Result<Self, AuthError> {
        let mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| AuthError::InvalidSecret(e.to_string()))?;
        Ok(Self { mac, secure })
    }

    /// Sign a session token into a cookie value.
    pub fn sign(&self, token: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(token.as_bytes());
        let signature = mac.finalize().into_bytes();
        format!("{}.{}", token, URL_SAFE_NO_PAD.encode(signature))
    }

    /// Recover the token from a signed cookie value.
    pub fn verify(&self, value: &str) -> Option<String> {
        let (token, signature) = value.rsplit_once('.')?;
        let signature = URL_SAFE_NO_PAD.decode(signature).ok()?;
        let mut mac = self.mac.clone();
        mac.update(token.as_bytes());
        // verify_slice compares in constant time
        mac.verify_slice(&signature).ok()?;
        Some(token.to_string())
    }

    /// `Set-Cookie` header value that stores a session for `max_age`.
    pub fn session_cookie(&self, token: &str, max_age: Duration) -> String {
        self.cookie_with(&self.sign(token), max_age.as_secs())
    }

    /// `Set-Cookie` header value that removes the session cookie.
    pub fn clear_cookie(&self) -> String {
        self.cookie_with("", 0)
    }

    /// Extract and verify the session token from request headers.
    pub fn token_from_headers(&self, headers: &HeaderMap) -> Option<String> {
        read_cookie(headers, SESSION_COOKIE).and_then(|value| self.verify(value))
    }

    fn cookie_with(&self, value: &str, max_age: u64) -> String {
        let mut cookie = format!(
            "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
            SESSION_COOKIE, value, max_age
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

/// Find a cookie by name across all `Cookie` headers.
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| {
            // A cookie value may be sent DQUOTE-wrapped
            value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value)
        })
}
