use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use keygate_core::PermissionId;

/// Permission name.
///
/// Permissions are `resource.action` strings (e.g. "user.read"). Matching is
/// exact string equality; there is no wildcard expansion at this layer —
/// the super-identity bypass happens above, in the resolver and guards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionName(Cow<'static, str>);

impl PermissionName {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `resource` half of `resource.action`, or the whole name when it
    /// has no separator.
    pub fn resource(&self) -> &str {
        self.as_str().split('.').next().unwrap_or(self.as_str())
    }

    /// The `action` half of `resource.action`, if present.
    pub fn action(&self) -> Option<&str> {
        let (_, action) = self.as_str().split_once('.')?;
        Some(action)
    }
}

impl core::fmt::Display for PermissionName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for PermissionName {
    fn from(value: &'static str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PermissionName {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// A permission catalog entry. Permissions are global, not org-scoped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: PermissionId,
    pub name: PermissionName,
    pub description: Option<String>,
}

impl Permission {
    pub fn new(name: impl Into<PermissionName>, description: Option<String>) -> Self {
        Self {
            id: PermissionId::new(),
            name: name.into(),
            description,
        }
    }
}

/// The global permission catalog seeded into a fresh deployment.
///
/// Names follow `resource.action`. Default-role bootstrap selects from this
/// list; see [`crate::resolver`].
pub fn standard_catalog() -> Vec<Permission> {
    [
        ("api.use", "Call the platform API"),
        ("user.read", "View users"),
        ("user.create", "Create users"),
        ("user.update", "Update users"),
        ("user.delete", "Delete users"),
        ("tenant.read", "View sub-tenants"),
        ("tenant.create", "Create sub-tenants"),
        ("tenant.update", "Update sub-tenants"),
        ("tenant.delete", "Delete sub-tenants"),
        ("org.read", "View the organization"),
        ("org.update", "Update the organization"),
        ("role.read", "View roles"),
        ("role.create", "Create roles"),
        ("role.assign", "Assign roles to users"),
        ("license.read", "View license state"),
    ]
    .into_iter()
    .map(|(name, description)| Permission::new(name, Some(description.to_string())))
    .collect()
}
