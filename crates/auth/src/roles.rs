use std::borrow::Cow;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Role kind used for CRM authorization.
///
/// Kinds are opaque strings at this layer so new kinds can be introduced
/// without touching the evaluator; the three built-in kinds are exposed as
/// constants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleKind(Cow<'static, str>);

impl RoleKind {
    pub const ADMIN: RoleKind = RoleKind(Cow::Borrowed("admin"));
    pub const CURATOR: RoleKind = RoleKind(Cow::Borrowed("curator"));
    pub const PROJECTANT: RoleKind = RoleKind(Cow::Borrowed("projectant"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The kinds shipped with the system.
    pub fn builtin() -> [RoleKind; 3] {
        [Self::ADMIN, Self::CURATOR, Self::PROJECTANT]
    }

    pub fn is_builtin(&self) -> bool {
        Self::builtin().iter().any(|k| k == self)
    }
}

impl core::fmt::Display for RoleKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Distinct role kinds held by a user.
pub type RoleSet = HashSet<RoleKind>;

/// Returns `true` when at least one of `wanted` is in `held`.
pub fn intersects(held: &RoleSet, wanted: &[RoleKind]) -> bool {
    wanted.iter().any(|k| held.contains(k))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_constants_match_wire_names() {
        assert_eq!(RoleKind::ADMIN.as_str(), "admin");
        assert_eq!(RoleKind::CURATOR.to_string(), "curator");
        assert_eq!(RoleKind::new("projectant"), RoleKind::PROJECTANT);
        assert!(RoleKind::PROJECTANT.is_builtin());
        assert!(!RoleKind::new("mentor").is_builtin());
    }

    #[test]
    fn serializes_as_plain_string() {
        let json = serde_json::to_string(&RoleKind::CURATOR).unwrap();
        assert_eq!(json, "\"curator\"");
        let back: RoleKind = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(back, RoleKind::ADMIN);
    }

    #[test]
    fn intersection_is_any_match() {
        let held: RoleSet = [RoleKind::PROJECTANT].into_iter().collect();
        assert!(intersects(&held, &[RoleKind::ADMIN, RoleKind::PROJECTANT]));
        assert!(!intersects(&held, &[RoleKind::ADMIN]));
        assert!(!intersects(&held, &[]));
    }
}
