use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use keygate_core::{OrgId, SubTenantId, UserId};

/// Bearer token claims model (transport-agnostic).
///
/// This is the minimal set of claims the platform expects once a token has
/// been decoded and signature-verified by [`crate::token::Hs256TokenCodec`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject / user identifier.
    pub sub: UserId,

    /// Organization the token was issued within.
    pub org_id: OrgId,

    /// Optional sub-tenant scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<SubTenantId>,

    /// Platform super-identity flag (bypasses license and permission checks).
    #[serde(default)]
    pub super_identity: bool,

    /// Organization admin flag.
    #[serde(default)]
    pub org_admin: bool,

    /// Issued-at timestamp.
    pub issued_at: DateTime<Utc>,

    /// Expiration timestamp.
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,

    #[error("token signature invalid or token malformed")]
    Invalid,
}

/// Deterministically validate token claims.
///
/// Note: this validates the *claims* only. Signature verification / decoding
/// lives in [`crate::token`].
pub fn validate_claims(
    claims: &AccessClaims,
    now: DateTime<Utc>,
) -> Result<(), TokenValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}
