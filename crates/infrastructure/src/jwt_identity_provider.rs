//! Signed JWT verification for caller identities.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;
use serde_json::{Map, Value};

use rolegate_application::{IdentityProvider, VerifiedToken};
use rolegate_core::{AppError, AppResult, ClaimSet};

/// Shortest accepted HMAC signing secret.
const MIN_SECRET_LENGTH: usize = 32;

/// Registered claims handled by validation and never exposed as custom claims.
const REGISTERED_CLAIMS: &[&str] = &["sub", "iat", "exp", "nbf", "iss", "aud", "jti"];

#[derive(Debug, Deserialize)]
struct TokenClaims {
    sub: String,
    #[serde(default)]
    iat: Option<i64>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

/// Identity provider that verifies HS256 or RS256 bearer tokens locally.
#[derive(Clone)]
pub struct JwtIdentityProvider {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtIdentityProvider {
    /// Creates a provider for HMAC-SHA256 tokens signed with a shared secret.
    pub fn hs256(secret: &str, issuer: Option<&str>, audience: Option<&str>) -> AppResult<Self> {
        if secret.len() < MIN_SECRET_LENGTH {
            return Err(AppError::Configuration(format!(
                "TOKEN_SIGNING_SECRET must be at least {MIN_SECRET_LENGTH} characters"
            )));
        }

        Ok(Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: build_validation(Algorithm::HS256, issuer, audience),
        })
    }

    /// Creates a provider for RS256 tokens verified with a PEM public key.
    pub fn rs256_pem(
        public_key_pem: &str,
        issuer: Option<&str>,
        audience: Option<&str>,
    ) -> AppResult<Self> {
        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes()).map_err(|error| {
            AppError::Configuration(format!("invalid TOKEN_PUBLIC_KEY_PEM: {error}"))
        })?;

        Ok(Self {
            decoding_key,
            validation: build_validation(Algorithm::RS256, issuer, audience),
        })
    }
}

fn build_validation(
    algorithm: Algorithm,
    issuer: Option<&str>,
    audience: Option<&str>,
) -> Validation {
    let mut validation = Validation::new(algorithm);
    validation.set_required_spec_claims(&["exp", "sub"]);

    if let Some(issuer) = issuer {
        validation.set_issuer(&[issuer]);
    }
    match audience {
        Some(audience) => validation.set_audience(&[audience]),
        None => validation.validate_aud = false,
    }

    validation
}

#[async_trait]
impl IdentityProvider for JwtIdentityProvider {
    async fn verify_token(&self, raw_token: &str) -> AppResult<VerifiedToken> {
        let token = decode::<TokenClaims>(raw_token, &self.decoding_key, &self.validation)
            .map_err(|error| {
                let reason = match error.kind() {
                    ErrorKind::ExpiredSignature => "token has expired".to_owned(),
                    ErrorKind::ImmatureSignature => "token is not valid yet".to_owned(),
                    ErrorKind::InvalidSignature => "signature mismatch".to_owned(),
                    ErrorKind::InvalidIssuer => "unexpected issuer".to_owned(),
                    ErrorKind::InvalidAudience => "unexpected audience".to_owned(),
                    _ => format!("token could not be verified: {error}"),
                };
                AppError::InvalidToken(reason)
            })?;

        let TokenClaims { sub, iat, mut rest } = token.claims;
        for registered in REGISTERED_CLAIMS {
            rest.remove(*registered);
        }

        Ok(VerifiedToken {
            subject: sub,
            claims: ClaimSet::new(rest),
            issued_at: issued_at(iat),
        })
    }
}

fn issued_at(iat: Option<i64>) -> DateTime<Utc> {
    iat.and_then(|seconds| Utc.timestamp_opt(seconds, 0).single())
        .unwrap_or_else(Utc::now)
}
