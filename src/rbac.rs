//! Role hierarchy and permission resolution.
//!
//! Wildcard permission patterns (`resource:action` pairs, with `*`
//! segments) and full role inheritance, resolved once at build time via
//! DFS with cycle detection.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::config::RbacConfig;
use crate::error::{Error, Result};

/// A compiled role: its own permission patterns plus the transitive closure
/// inherited from its parents.
#[derive(Debug, Clone)]
struct CompiledRole {
    direct_permissions: Vec<String>,
    parents: Vec<String>,
}

/// The RBAC engine: a compiled role graph with memoized transitive closures,
/// built once at startup and read concurrently thereafter.
#[derive(Debug, Clone)]
pub struct RbacEngine {
    roles: HashMap<String, CompiledRole>,
    /// Memoized `role -> full permission set` (including inherited).
    closures: HashMap<String, BTreeSet<String>>,
}

impl RbacEngine {
    /// Build the engine from configuration, resolving every role's
    /// transitive closure and rejecting inheritance cycles.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a role references an unknown parent or
    /// the inheritance graph contains a cycle.
    pub fn build(config: &RbacConfig) -> Result<Self> {
        let mut roles = HashMap::new();
        for role in &config.roles {
            roles.insert(
                role.id.clone(),
                CompiledRole {
                    direct_permissions: role.permissions.clone(),
                    parents: role.inherits.clone(),
                },
            );
        }

        for role in roles.values() {
            for parent in &role.parents {
                if !roles.contains_key(parent) {
                    return Err(Error::Config(format!(
                        "role inherits unknown parent role '{parent}'"
                    )));
                }
            }
        }

        let mut closures = HashMap::with_capacity(roles.len());
        for role_id in roles.keys() {
            let mut visiting = HashSet::new();
            let closure = resolve_closure(role_id, &roles, &mut visiting)?;
            closures.insert(role_id.clone(), closure);
        }

        Ok(Self { roles, closures })
    }

    /// Resolve the full (direct + inherited) permission set for a set of
    /// role IDs. Unknown role IDs are silently ignored — a principal minted
    /// by an upstream provider may carry roles this instance's config does
    /// not (yet) define.
    #[must_use]
    pub fn resolve_permissions(&self, role_ids: &[String]) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        for role_id in role_ids {
            if let Some(closure) = self.closures.get(role_id) {
                out.extend(closure.iter().cloned());
            }
        }
        out
    }

    /// `true` if `role_id` is a known, compiled role.
    #[must_use]
    pub fn has_role(&self, role_id: &str) -> bool {
        self.roles.contains_key(role_id)
    }

    /// Check whether `permissions` grants `resource:action`, honoring
    /// `*:action`, `resource:*`, and `*:*` wildcards.
    #[must_use]
    pub fn has_permission(permissions: &BTreeSet<String>, resource: &str, action: &str) -> bool {
        let exact = format!("{resource}:{action}");
        if permissions.contains(&exact) {
            return true;
        }
        if permissions.contains(&format!("{resource}:*")) {
            return true;
        }
        if permissions.contains(&format!("*:{action}")) {
            return true;
        }
        if permissions.contains("*:*") {
            return true;
        }
        false
    }
}

fn resolve_closure(
    role_id: &str,
    roles: &HashMap<String, CompiledRole>,
    visiting: &mut HashSet<String>,
) -> Result<BTreeSet<String>> {
    if !visiting.insert(role_id.to_string()) {
        return Err(Error::Config(format!(
            "role inheritance cycle detected at '{role_id}'"
        )));
    }

    let role = roles
        .get(role_id)
        .ok_or_else(|| Error::Config(format!("unknown role '{role_id}'")))?;

    let mut closure: BTreeSet<String> = role.direct_permissions.iter().cloned().collect();
    for parent in &role.parents {
        let parent_closure = resolve_closure(parent, roles, visiting)?;
        closure.extend(parent_closure);
    }

    visiting.remove(role_id);
    Ok(closure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoleConfig;

    fn role(id: &str, permissions: &[&str], inherits: &[&str]) -> RoleConfig {
        RoleConfig {
            id: id.to_string(),
            name: id.to_string(),
            permissions: permissions.iter().map(|s| s.to_string()).collect(),
            inherits: inherits.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn resolves_direct_permissions() {
        let config = RbacConfig {
            roles: vec![role("viewer", &["events:read"], &[])],
            ..Default::default()
        };
        let engine = RbacEngine::build(&config).unwrap();
        let perms = engine.resolve_permissions(&["viewer".to_string()]);
        assert!(perms.contains("events:read"));
    }

    #[test]
    fn resolves_inherited_permissions() {
        let config = RbacConfig {
            roles: vec![
                role("viewer", &["events:read"], &[]),
                role("editor", &["events:write"], &["viewer"]),
            ],
            ..Default::default()
        };
        let engine = RbacEngine::build(&config).unwrap();
        let perms = engine.resolve_permissions(&["editor".to_string()]);
        assert!(perms.contains("events:read"));
        assert!(perms.contains("events:write"));
    }

    #[test]
    fn detects_inheritance_cycle() {
        let config = RbacConfig {
            roles: vec![role("a", &[], &["b"]), role("b", &[], &["a"])],
            ..Default::default()
        };
        assert!(RbacEngine::build(&config).is_err());
    }

    #[test]
    fn rejects_unknown_parent() {
        let config = RbacConfig {
            roles: vec![role("orphan", &[], &["ghost"])],
            ..Default::default()
        };
        assert!(RbacEngine::build(&config).is_err());
    }

    #[test]
    fn wildcard_resource_grants_any_action() {
        let mut perms = BTreeSet::new();
        perms.insert("events:*".to_string());
        assert!(RbacEngine::has_permission(&perms, "events", "delete"));
        assert!(!RbacEngine::has_permission(&perms, "users", "delete"));
    }

    #[test]
    fn wildcard_action_grants_any_resource() {
        let mut perms = BTreeSet::new();
        perms.insert("*:read".to_string());
        assert!(RbacEngine::has_permission(&perms, "events", "read"));
        assert!(!RbacEngine::has_permission(&perms, "events", "write"));
    }

    #[test]
    fn full_wildcard_grants_everything() {
        let mut perms = BTreeSet::new();
        perms.insert("*:*".to_string());
        assert!(RbacEngine::has_permission(&perms, "anything", "goes"));
    }

    #[test]
    fn diamond_inheritance_resolves_without_duplication_error() {
        let config = RbacConfig {
            roles: vec![
                role("base", &["a:read"], &[]),
                role("left", &["b:read"], &["base"]),
                role("right", &["c:read"], &["base"]),
                role("top", &["d:read"], &["left", "right"]),
            ],
            ..Default::default()
        };
        let engine = RbacEngine::build(&config).unwrap();
        let perms = engine.resolve_permissions(&["top".to_string()]);
        assert!(perms.contains("a:read"));
        assert!(perms.contains("b:read"));
        assert!(perms.contains("c:read"));
        assert!(perms.contains("d:read"));
    }
}
