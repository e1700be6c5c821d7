//! Declarative read/write role policies for resource families.

use serde::Serialize;

use crate::RoleKind;

/// Read-only vs. state-changing classification of an inbound operation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestSafety {
    Safe,
    Unsafe,
}

impl RequestSafety {
    /// GET, HEAD and OPTIONS are safe; every other method is state-changing.
    pub fn from_method(method: &str) -> Self {
        match method.to_ascii_uppercase().as_str() {
            "GET" | "HEAD" | "OPTIONS" => RequestSafety::Safe,
            _ => RequestSafety::Unsafe,
        }
    }

    pub fn is_safe(self) -> bool {
        self == RequestSafety::Safe
    }
}

/// A `(read roles, write roles)` pair.
///
/// An empty applicable side always denies; it is never an implicit allow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourcePolicy {
    pub name: &'static str,
    pub read_roles: Vec<RoleKind>,
    pub write_roles: Vec<RoleKind>,
}

impl ResourcePolicy {
    pub fn new(name: &'static str, read_roles: Vec<RoleKind>, write_roles: Vec<RoleKind>) -> Self {
        Self {
            name,
            read_roles,
            write_roles,
        }
    }

    /// Same role set for reads and writes.
    pub fn uniform(name: &'static str, roles: Vec<RoleKind>) -> Self {
        Self::new(name, roles.clone(), roles)
    }

    pub fn admin_only() -> Self {
        Self::uniform("admin_only", vec![RoleKind::ADMIN])
    }

    pub fn curator_only() -> Self {
        Self::uniform("curator_only", vec![RoleKind::CURATOR])
    }

    pub fn projectant_only() -> Self {
        Self::uniform("projectant_only", vec![RoleKind::PROJECTANT])
    }

    pub fn curator_or_admin() -> Self {
        Self::uniform("curator_or_admin", vec![RoleKind::CURATOR, RoleKind::ADMIN])
    }

    pub fn projectant_read_curator_admin_write() -> Self {
        Self::new(
            "projectant_read_curator_admin_write",
            vec![RoleKind::PROJECTANT, RoleKind::CURATOR, RoleKind::ADMIN],
            vec![RoleKind::CURATOR, RoleKind::ADMIN],
        )
    }

    /// Role kinds that satisfy the policy for the given request classification.
    pub fn applicable(&self, safety: RequestSafety) -> &[RoleKind] {
        match safety {
            RequestSafety::Safe => &self.read_roles,
            RequestSafety::Unsafe => &self.write_roles,
        }
    }

    pub fn presets() -> [ResourcePolicy; 5] {
        [
            Self::admin_only(),
            Self::curator_only(),
            Self::projectant_only(),
            Self::curator_or_admin(),
            Self::projectant_read_curator_admin_write(),
        ]
    }

    /// Look a preset up by its `name`.
    pub fn preset(name: &str) -> Option<Self> {
        Self::presets().into_iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_classification() {
        assert_eq!(RequestSafety::from_method("GET"), RequestSafety::Safe);
        assert_eq!(RequestSafety::from_method("head"), RequestSafety::Safe);
        assert_eq!(RequestSafety::from_method("OPTIONS"), RequestSafety::Safe);
        for m in ["POST", "PUT", "PATCH", "DELETE"] {
            assert_eq!(RequestSafety::from_method(m), RequestSafety::Unsafe);
        }
    }

    #[test]
    fn mixed_preset_splits_read_and_write() {
        let p = ResourcePolicy::projectant_read_curator_admin_write();
        assert!(p.applicable(RequestSafety::Safe).contains(&RoleKind::PROJECTANT));
        assert!(!p.applicable(RequestSafety::Unsafe).contains(&RoleKind::PROJECTANT));
        assert_eq!(p.applicable(RequestSafety::Unsafe), &[RoleKind::CURATOR, RoleKind::ADMIN]);
    }

    #[test]
    fn uniform_presets_share_sides() {
        for p in [
            ResourcePolicy::admin_only(),
            ResourcePolicy::curator_only(),
            ResourcePolicy::projectant_only(),
            ResourcePolicy::curator_or_admin(),
        ] {
            assert_eq!(p.read_roles, p.write_roles, "{}", p.name);
        }
    }

    #[test]
    fn presets_are_found_by_name() {
        assert_eq!(ResourcePolicy::preset("curator_or_admin"), Some(ResourcePolicy::curator_or_admin()));
        assert_eq!(ResourcePolicy::preset("everyone"), None);
    }
}
