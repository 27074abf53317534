use std::error::Error as StdError;
use std::fmt;

use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};

use super::claims::IdentityToken;
use crate::config::AuthConfig;

// Errors returned by bearer-token verification.
#[derive(Debug)]
pub enum VerifyError {
    Jwt(jsonwebtoken::errors::Error),
    MissingSubject,
    InvalidKey(String),
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Jwt(e) => write!(f, "jwt verification failed: {}", e),
            Self::MissingSubject => write!(f, "missing or empty 'sub' claim"),
            Self::InvalidKey(e) => write!(f, "invalid verification key: {}", e),
        }
    }
}

impl StdError for VerifyError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Jwt(e) => Some(e),
            _ => None,
        }
    }
}

impl From<jsonwebtoken::errors::Error> for VerifyError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        Self::Jwt(e)
    }
}

/// Turns a raw bearer credential into a verified [`IdentityToken`].
pub trait TokenVerifier: Send + Sync + fmt::Debug {
    fn verify(&self, bearer: &str) -> Result<IdentityToken, VerifyError>;
}

/// JWT verifier (HS256 shared secret or EdDSA public key).
///
/// - Key material is intentionally not printable via Debug.
#[derive(Clone)]
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl fmt::Debug for JwtVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print key material
        f.debug_struct("JwtVerifier")
            .field("validation", &self.validation)
            .finish()
    }
}

impl JwtVerifier {
    pub fn hs256(secret: &[u8]) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn eddsa(public_key_pem: &str) -> Result<Self, VerifyError> {
        let decoding_key = DecodingKey::from_ed_pem(public_key_pem.as_bytes())
            .map_err(|e| VerifyError::InvalidKey(e.to_string()))?;

        Ok(Self {
            decoding_key,
            validation: Validation::new(Algorithm::EdDSA),
        })
    }

    /// Builds a verifier from config; `Ok(None)` when no key is configured.
    pub fn from_config(config: &AuthConfig) -> Result<Option<Self>, VerifyError> {
        let verifier = match (&config.jwt_public_key_pem, &config.jwt_secret) {
            (Some(pem), _) => Self::eddsa(pem)?,
            (None, Some(secret)) => Self::hs256(secret.as_bytes()),
            (None, None) => return Ok(None),
        };

        Ok(Some(verifier.with_claims_policy(
            config.issuer.as_deref(),
            config.audience.as_deref(),
            config.leeway_seconds,
        )))
    }

    pub fn with_claims_policy(
        mut self,
        issuer: Option<&str>,
        audience: Option<&str>,
        leeway_seconds: u64,
    ) -> Self {
        if let Some(issuer) = issuer {
            self.validation.set_issuer(&[issuer]);
        }
        match audience {
            Some(audience) => self.validation.set_audience(&[audience]),
            // Tokens may carry an `aud` we have no opinion about.
            None => self.validation.validate_aud = false,
        }
        self.validation.leeway = leeway_seconds;
        self
    }
}

impl TokenVerifier for JwtVerifier {
    fn verify(&self, bearer: &str) -> Result<IdentityToken, VerifyError> {
        let data =
            jsonwebtoken::decode::<Map<String, Value>>(bearer, &self.decoding_key, &self.validation)?;

        IdentityToken::from_json_claims(data.claims).ok_or(VerifyError::MissingSubject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header};
    use serde_json::json;

    const SECRET: &[u8] = b"unit-test-secret";

    fn exp() -> i64 {
        chrono::Utc::now().timestamp() + 300
    }

    fn sign(claims: Value, secret: &[u8]) -> String {
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret),
        )
        .unwrap()
    }

    #[test]
    fn valid_token_yields_claims() {
        let verifier = JwtVerifier::hs256(SECRET);
        let token = sign(
            json!({"sub": "u-1", "exp": exp(), "preferred_username": "alice", "roles": ["Admin"]}),
            SECRET,
        );

        let identity = verifier.verify(&token).unwrap();
        assert_eq!(identity.subject(), "u-1");
        assert_eq!(identity.claim_as_text("preferred_username"), Some("alice"));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let verifier = JwtVerifier::hs256(SECRET);
        let token = sign(json!({"sub": "u-1", "exp": exp()}), b"other-secret");

        assert!(matches!(verifier.verify(&token), Err(VerifyError::Jwt(_))));
    }

    #[test]
    fn missing_subject_is_rejected() {
        let verifier = JwtVerifier::hs256(SECRET);
        let token = sign(json!({"exp": exp(), "name": "Alice"}), SECRET);

        assert!(matches!(
            verifier.verify(&token),
            Err(VerifyError::MissingSubject)
        ));
    }

    #[test]
    fn audience_is_enforced_when_configured() {
        let verifier = JwtVerifier::hs256(SECRET).with_claims_policy(None, Some("api://starter"), 0);
        let token = sign(json!({"sub": "u-1", "exp": exp(), "aud": "api://other"}), SECRET);

        assert!(verifier.verify(&token).is_err());
    }

    #[test]
    fn no_key_means_no_verifier() {
        let config = AuthConfig::default();
        assert!(JwtVerifier::from_config(&config).unwrap().is_none());
    }
}
