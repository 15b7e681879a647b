use serde::{Deserialize, Serialize};

use keygate_core::{OrgId, RoleId};

/// An organization-scoped bundle of permissions.
///
/// Role names are unique per organization; the role↔permission and
/// user↔role joins live behind [`crate::resolver::RbacStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub org_id: OrgId,
    pub name: String,
    pub description: Option<String>,
}

impl Role {
    pub fn new(org_id: OrgId, name: impl Into<String>, description: Option<String>) -> Self {
        Self {
            id: RoleId::new(),
            org_id,
            name: name.into(),
            description,
        }
    }
}
