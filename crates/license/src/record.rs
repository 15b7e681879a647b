//! The persisted license row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use keygate_core::{LicenseId, OrgId};

use crate::payload::FeatureSet;
use crate::status::LicenseStatus;

/// A stored license: one row per issued key.
///
/// The opaque `key` is the unique lookup handle; `signature` duplicates the
/// key's trailing segment so audits can confirm which signing key sealed it
/// without re-parsing the blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    pub id: LicenseId,
    pub org_id: OrgId,
    pub key: String,
    pub status: LicenseStatus,
    pub features: FeatureSet,
    pub issued_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub signature: String,
}
