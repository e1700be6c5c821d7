//! Role assignments and the entity they are scoped to.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crm_core::{
    ApplicationId, DirectionId, DomainError, EventId, ProfileId, ProjectId, RoleAssignmentId,
    UserId,
};

use crate::RoleKind;

/// Kind of entity a role can be scoped to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    Profile,
    Event,
    Direction,
    Project,
    Application,
}

impl TargetType {
    pub fn as_str(self) -> &'static str {
        match self {
            TargetType::Profile => "profile",
            TargetType::Event => "event",
            TargetType::Direction => "direction",
            TargetType::Project => "project",
            TargetType::Application => "application",
        }
    }
}

impl core::fmt::Display for TargetType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "profile" => Ok(TargetType::Profile),
            "event" => Ok(TargetType::Event),
            "direction" => Ok(TargetType::Direction),
            "project" => Ok(TargetType::Project),
            "application" => Ok(TargetType::Application),
            other => Err(DomainError::validation(format!("unknown target type '{other}'"))),
        }
    }
}

/// Discriminated reference to the entity a role is scoped to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleTarget {
    pub target_type: TargetType,
    pub target_id: i64,
}

impl RoleTarget {
    pub fn new(target_type: TargetType, target_id: i64) -> Self {
        Self {
            target_type,
            target_id,
        }
    }

    pub fn profile(id: ProfileId) -> Self {
        Self::new(TargetType::Profile, id.get())
    }

    pub fn event(id: EventId) -> Self {
        Self::new(TargetType::Event, id.get())
    }

    pub fn direction(id: DirectionId) -> Self {
        Self::new(TargetType::Direction, id.get())
    }

    pub fn project(id: ProjectId) -> Self {
        Self::new(TargetType::Project, id.get())
    }

    pub fn application(id: ApplicationId) -> Self {
        Self::new(TargetType::Application, id.get())
    }
}

impl core::fmt::Display for RoleTarget {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} #{}", self.target_type, self.target_id)
    }
}

/// A role grant that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleGrant {
    pub user_id: UserId,
    pub role: RoleKind,
    pub target: RoleTarget,
}

/// A persisted `(user, role kind, target)` tuple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub id: RoleAssignmentId,
    pub user_id: UserId,
    pub role: RoleKind,
    pub target: RoleTarget,
}

impl RoleAssignment {
    pub fn matches_grant(&self, grant: &RoleGrant) -> bool {
        self.user_id == grant.user_id && self.role == grant.role && self.target == grant.target
    }
}
