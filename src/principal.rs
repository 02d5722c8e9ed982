//! The authenticated subject attached to a request.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// The authenticated subject of a request.
///
/// Created by an [`crate::auth::AuthProvider`] on successful verification,
/// carried in the request-scoped [`crate::request::RequestContext`], and
/// never mutated in place — authorization changes produce a new `Principal`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Opaque subject ID, unique per provider.
    pub subject_id: String,
    /// Optional human-readable display name.
    pub display_name: Option<String>,
    /// Optional email address.
    pub email: Option<String>,
    /// Ordered set of role IDs assigned to this principal.
    pub roles: Vec<String>,
    /// Resolved permission set (RBAC transitive closure over `roles`, plus
    /// any direct permissions granted by the authenticating provider).
    pub permissions: BTreeSet<String>,
    /// Free-form attribute map, consulted by policy attribute conditions.
    pub attributes: BTreeMap<String, String>,
}

impl Principal {
    /// Build a principal with no roles or permissions yet resolved.
    #[must_use]
    pub fn new(subject_id: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            display_name: None,
            email: None,
            roles: Vec::new(),
            permissions: BTreeSet::new(),
            attributes: BTreeMap::new(),
        }
    }

    /// Attach roles (builder style).
    #[must_use]
    pub fn with_roles(mut self, roles: impl IntoIterator<Item = String>) -> Self {
        self.roles = roles.into_iter().collect();
        self
    }

    /// Attach a resolved permission set (builder style).
    #[must_use]
    pub fn with_permissions(mut self, permissions: impl IntoIterator<Item = String>) -> Self {
        self.permissions = permissions.into_iter().collect();
        self
    }

    /// Attach an attribute (builder style).
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Direct role membership check (no inheritance — inheritance applies
    /// to permissions, not role identity).
    #[must_use]
    pub fn has_any_role(&self, roles: &[&str]) -> bool {
        roles.iter().any(|r| self.roles.iter().any(|pr| pr == r))
    }
}
