//! License lifecycle error model.

use thiserror::Error;

use keygate_core::StoreError;

use crate::codec::CodecError;
use crate::status::LicenseStatus;

/// Failures of the lifecycle manager's administrative operations.
///
/// `validate` reports domain-invalid licenses through
/// [`crate::LicenseValidation`], not through this enum; an `Err` there means
/// the store itself failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LicenseError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("license not found")]
    NotFound,

    /// Issuance was requested for an organization that does not exist.
    #[error("organization not found")]
    OrgNotFound,

    /// The state machine forbids the requested transition
    /// (e.g. suspending a revoked license).
    #[error("invalid license transition: {from} -> {to}")]
    InvalidTransition {
        from: LicenseStatus,
        to: LicenseStatus,
    },

    #[error("license store error: {0}")]
    Store(String),
}

impl From<StoreError> for LicenseError {
    fn from(err: StoreError) -> Self {
        Self::Store(err.to_string())
    }
}
