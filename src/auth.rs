//! Bearer token verification.
//!
//! Tokens are issued by the external identity provider as HS256 JWTs whose
//! `id` claim is the user id. This service only verifies them; the resolved
//! [`UserId`] is then passed explicitly to every cart and order call.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::domain::value_objects::UserId;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "HS256";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("No token provided")]
    MissingToken,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    Expired,
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    typ: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    id: String,
    exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iat: Option<i64>,
}

#[derive(Clone)]
pub struct TokenVerifier {
    secret: Arc<[u8]>,
}

impl TokenVerifier {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self { secret: Arc::from(secret.as_ref()) }
    }

    pub fn verify(&self, token: &str) -> Result<UserId, AuthError> {
        self.verify_at(token, Utc::now().timestamp())
    }

    pub fn verify_at(&self, token: &str, now: i64) -> Result<UserId, AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }
        let (signing_input, signature) = token.rsplit_once('.').ok_or(AuthError::InvalidToken)?;
        let (header, payload) = signing_input.split_once('.').ok_or(AuthError::InvalidToken)?;
        if payload.contains('.') {
            return Err(AuthError::InvalidToken);
        }

        let header: Header = decode_segment(header)?;
        if header.alg != ALGORITHM {
            return Err(AuthError::InvalidToken);
        }

        let signature = URL_SAFE_NO_PAD.decode(signature).map_err(|_| AuthError::InvalidToken)?;
        let mut mac = self.mac()?;
        mac.update(signing_input.as_bytes());
        mac.verify_slice(&signature).map_err(|_| AuthError::InvalidToken)?;

        let claims: Claims = decode_segment(payload)?;
        if claims.id.trim().is_empty() {
            return Err(AuthError::InvalidToken);
        }
        if claims.exp <= now {
            return Err(AuthError::Expired);
        }
        Ok(UserId::new(claims.id))
    }

    /// Signs a token for `user_id`. The identity provider does this in
    /// production; here it backs tests and local tooling.
    pub fn issue(&self, user_id: &UserId, ttl: chrono::Duration) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        self.issue_with_exp(user_id, now, now + ttl.num_seconds())
    }

    fn issue_with_exp(&self, user_id: &UserId, iat: i64, exp: i64) -> Result<String, AuthError> {
        let header = Header { alg: ALGORITHM.to_string(), typ: Some("JWT".to_string()) };
        let claims = Claims { id: user_id.as_str().to_string(), exp, iat: Some(iat) };
        let signing_input = format!("{}.{}", encode_segment(&header), encode_segment(&claims));
        let mut mac = self.mac()?;
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        Ok(format!("{signing_input}.{signature}"))
    }

    fn mac(&self) -> Result<HmacSha256, AuthError> {
        <HmacSha256 as Mac>::new_from_slice(&self.secret).map_err(|_| AuthError::InvalidToken)
    }
}

/// Pulls the token out of an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let value = header.ok_or(AuthError::MissingToken)?;
    let token = value.strip_prefix("Bearer ").ok_or(AuthError::MissingToken)?.trim();
    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }
    Ok(token)
}

fn encode_segment<T: Serialize>(value: &T) -> String {
    // Plain structs of strings and integers always serialize.
    URL_SAFE_NO_PAD.encode(serde_json::to_vec(value).unwrap_or_default())
}

fn decode_segment<T: for<'de> Deserialize<'de>>(segment: &str) -> Result<T, AuthError> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).map_err(|_| AuthError::InvalidToken)?;
    serde_json::from_slice(&bytes).map_err(|_| AuthError::InvalidToken)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> TokenVerifier { TokenVerifier::new("test-secret") }

    #[test]
    fn test_issue_then_verify() {
        let v = verifier();
        let token = v.issue(&UserId::new("64f1c0ffee"), chrono::Duration::hours(1)).unwrap();
        assert_eq!(v.verify(&token).unwrap(), UserId::new("64f1c0ffee"));
    }

    #[test]
    fn test_rejects_wrong_secret_and_tampering() {
        let token = verifier().issue(&UserId::new("u1"), chrono::Duration::hours(1)).unwrap();
        assert_eq!(TokenVerifier::new("other").verify(&token), Err(AuthError::InvalidToken));

        let forged = encode_segment(&Claims { id: "admin".into(), exp: i64::MAX, iat: None });
        let mut parts: Vec<&str> = token.split('.').collect();
        parts[1] = &forged;
        assert_eq!(verifier().verify(&parts.join(".")), Err(AuthError::InvalidToken));
        assert_eq!(verifier().verify("not-a-jwt"), Err(AuthError::InvalidToken));
    }

    #[test]
    fn test_expired() {
        let v = verifier();
        let token = v.issue_with_exp(&UserId::new("u1"), 100, 200).unwrap();
        assert_eq!(v.verify_at(&token, 199).unwrap(), UserId::new("u1"));
        assert_eq!(v.verify_at(&token, 200), Err(AuthError::Expired));
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token(Some("Bearer abc")), Ok("abc"));
        assert_eq!(bearer_token(Some("Basic abc")), Err(AuthError::MissingToken));
        assert_eq!(bearer_token(Some("Bearer   ")), Err(AuthError::MissingToken));
        assert_eq!(bearer_token(None), Err(AuthError::MissingToken));
    }
}
