//! HS256 bearer token codec.
//!
//! Signature verification is delegated to `jsonwebtoken`; the time window is
//! checked by [`crate::claims::validate_claims`] because the claims carry
//! RFC 3339 timestamps rather than the registered numeric `exp`/`iat`.

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::claims::{AccessClaims, TokenValidationError, validate_claims};

/// Mints and verifies HS256-signed access tokens.
pub struct Hs256TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl Hs256TokenCodec {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Claims use RFC 3339 timestamps; expiry is enforced by
        // `validate_claims`, not by the registered `exp` claim.
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Sign a claims set into a compact token.
    pub fn mint(&self, claims: &AccessClaims) -> Result<String, TokenValidationError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|_| TokenValidationError::Invalid)
    }

    /// Verify signature and time window, returning the claims.
    pub fn verify(&self, token: &str) -> Result<AccessClaims, TokenValidationError> {
        let data =
            jsonwebtoken::decode::<AccessClaims>(token, &self.decoding, &self.validation)
                .map_err(|_| TokenValidationError::Invalid)?;

        validate_claims(&data.claims, Utc::now())?;
        Ok(data.claims)
    }
}
