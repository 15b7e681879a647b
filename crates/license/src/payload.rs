//! The plaintext structure sealed inside a license key.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use keygate_core::OrgId;

/// Feature grants carried by a license.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSet {
    /// Maximum number of user accounts the organization may hold.
    pub max_users: u32,

    /// Maximum number of sub-tenants the organization may create.
    pub max_tenants: u32,

    /// Per-organization API rate-limit override (requests/minute), if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_rate_limit: Option<u32>,

    /// Names of enabled product modules.
    #[serde(default)]
    pub modules: BTreeSet<String>,

    /// Free-form boolean feature flags.
    #[serde(default)]
    pub flags: BTreeMap<String, bool>,
}

impl Default for FeatureSet {
    fn default() -> Self {
        Self {
            max_users: 5,
            max_tenants: 1,
            api_rate_limit: None,
            modules: BTreeSet::new(),
            flags: BTreeMap::new(),
        }
    }
}

impl FeatureSet {
    /// Query whether a named module is enabled.
    pub fn module_enabled(&self, name: &str) -> bool {
        self.modules.contains(name)
    }

    /// Query a boolean flag, defaulting to false when unset.
    pub fn flag(&self, name: &str) -> bool {
        self.flags.get(name).copied().unwrap_or(false)
    }
}

/// The plaintext content encrypted inside a license key.
///
/// The `nonce` exists solely to make every encoding of an otherwise-identical
/// payload unique. It is never tracked or checked against a blacklist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicensePayload {
    /// Organization the license is bound to.
    pub company_id: OrgId,

    /// Organization name snapshot at issuance time.
    pub company_name: String,

    /// Feature grants.
    pub features: FeatureSet,

    /// Issuance timestamp.
    pub issued_at: DateTime<Utc>,

    /// Optional expiry; `None` means the license never expires by time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    /// Single-use random value; distinguishes repeated issuances.
    pub nonce: String,
}

impl LicensePayload {
    /// Build a payload issued now, with a fresh nonce.
    pub fn issue(
        company_id: OrgId,
        company_name: impl Into<String>,
        features: FeatureSet,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            company_id,
            company_name: company_name.into(),
            features,
            issued_at: Utc::now(),
            expires_at,
            nonce: Uuid::new_v4().to_string(),
        }
    }

    /// Returns true if the payload carries an expiry in the past.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp < now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_grants_get_distinct_nonces() {
        let org = OrgId::new();
        let a = LicensePayload::issue(org, "Acme", FeatureSet::default(), None);
        let b = LicensePayload::issue(org, "Acme", FeatureSet::default(), None);
        assert_ne!(a.nonce, b.nonce);
    }

    #[test]
    fn expiry_check_honors_unset_expiry() {
        let p = LicensePayload::issue(OrgId::new(), "Acme", FeatureSet::default(), None);
        assert!(!p.is_expired(Utc::now()));
    }
}
