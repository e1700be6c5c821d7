//! Role administration and authorization debugging.
//!
//! Every handler runs its operation through the role-required guard rather
//! than a route-level policy gate.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    routing::{delete, get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};

use crm_auth::{
    AuthorizationExplanation, CredentialStore, Principal, RequestSafety, ResourcePolicy,
    RoleAssignment, RoleGrant, RoleKind, RoleRequirement, RoleSource, RoleTarget, TargetType,
    UserDirectory, UserIdentity, explain_authorization, role_required,
};
use crm_catalog::CatalogStore;
use crm_core::{ApplicationId, DirectionId, DomainError, EventId, ProfileId, RoleAssignmentId, UserId};
use crm_infra::{ReconcileReport, reconcile_role_targets};

use crate::app::dto::{ExplainQuery, GrantRoleRequest, RoleAssignmentResponse};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

#[derive(Debug, Deserialize)]
pub struct ListRolesQuery {
    pub user_id: Option<UserId>,
}

pub fn router() -> Router {
    Router::new()
        .route("/roles/", get(list_roles).post(grant_role))
        .route("/roles/:assignment_id/", delete(revoke_role))
        .route("/roles/explain/", get(explain))
        .route("/roles/reconcile/", post(reconcile))
}

fn admins() -> RoleRequirement {
    role_required([RoleKind::ADMIN])
}

/// GET /roles/?user_id=
pub async fn list_roles(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(context): Extension<PrincipalContext>,
    Query(query): Query<ListRolesQuery>,
) -> Result<Json<Vec<RoleAssignmentResponse>>, ApiError> {
    let list = admins().wrap(|_: &Principal, user: Option<UserId>| -> Result<Vec<RoleAssignmentResponse>, ApiError> {
        let assignments = match user {
            Some(user) => services.credentials.role_assignments_for(user)?,
            None => services.credentials.list_role_assignments()?,
        };
        Ok(assignments.into_iter().map(RoleAssignmentResponse::from).collect())
    });
    Ok(Json(list.call(context.principal(), &services.roles, query.user_id)?))
}

/// POST /roles/ - idempotent; the target must exist.
pub async fn grant_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(context): Extension<PrincipalContext>,
    Json(req): Json<GrantRoleRequest>,
) -> Result<(StatusCode, Json<RoleAssignmentResponse>), ApiError> {
    let grant = admins().wrap(|principal: &Principal, grant: RoleGrant| -> Result<RoleAssignment, ApiError> {
        if services.credentials.find_user_by_id(grant.user_id)?.is_none() {
            return Err(DomainError::validation(format!("user {} does not exist", grant.user_id)).into());
        }
        if !target_exists(&services, &grant.target)? {
            return Err(DomainError::validation(format!("role target {} does not exist", grant.target)).into());
        }
        let assignment = services.credentials.assign_role(grant)?;
        tracing::info!(
            assignment_id = %assignment.id,
            user_id = %assignment.user_id,
            role = %assignment.role.as_str(),
            target = %assignment.target,
            granted_by = ?principal.user_id(),
            "role granted"
        );
        Ok(assignment)
    });

    let assignment = grant.call(context.principal(), &services.roles, req.into_grant())?;
    Ok((StatusCode::CREATED, Json(assignment.into())))
}

/// DELETE /roles/:assignment_id/
pub async fn revoke_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(context): Extension<PrincipalContext>,
    Path(id): Path<RoleAssignmentId>,
) -> Result<StatusCode, ApiError> {
    let revoke = admins().wrap(|principal: &Principal, id: RoleAssignmentId| -> Result<(), ApiError> {
        if !services.credentials.remove_role(id)? {
            return Err(ApiError::NotFound("role assignment"));
        }
        tracing::info!(assignment_id = %id, revoked_by = ?principal.user_id(), "role revoked");
        Ok(())
    });
    revoke.call(context.principal(), &services.roles, id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /roles/explain/?policy=..&method=..&user_id=..
///
/// What the evaluator would decide, and why.
pub async fn explain(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(context): Extension<PrincipalContext>,
    Query(query): Query<ExplainQuery>,
) -> Result<Json<AuthorizationExplanation>, ApiError> {
    let explain = admins().wrap(|principal: &Principal, query: ExplainQuery| -> Result<AuthorizationExplanation, ApiError> {
        let policy = ResourcePolicy::preset(&query.policy)
            .ok_or_else(|| DomainError::validation(format!("unknown policy '{}'", query.policy)))?;
        let safety = RequestSafety::from_method(query.method.as_deref().unwrap_or("GET"));

        let subject = match query.user_id {
            None => principal.clone(),
            Some(id) => {
                let account = services
                    .credentials
                    .find_user_by_id(id)?
                    .ok_or(ApiError::NotFound("user"))?;
                Principal::user(UserIdentity::from(&account))
            }
        };
        Ok(explain_authorization(&subject, safety, &policy, &services.roles)?)
    });
    Ok(Json(explain.call(context.principal(), &services.roles, query)?))
}

/// POST /roles/reconcile/ - drop assignments whose target is gone.
pub async fn reconcile(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(context): Extension<PrincipalContext>,
) -> Result<Json<Value>, ApiError> {
    let sweep = admins().wrap(|_: &Principal, (): ()| -> Result<ReconcileReport, ApiError> {
        Ok(reconcile_role_targets(&*services.catalog, &*services.credentials)?)
    });
    let report = sweep.call(context.principal(), &services.roles, ())?;
    Ok(Json(json!({
        "checked": report.checked,
        "removed": report.removed,
        "skipped": report.skipped,
    })))
}

/// Project targets live outside this service and are accepted as given.
fn target_exists(services: &AppServices, target: &RoleTarget) -> Result<bool, ApiError> {
    let id = target.target_id;
    Ok(match target.target_type {
        TargetType::Profile => services.credentials.find_profile_by_id(ProfileId::new(id))?.is_some(),
        TargetType::Event => services.catalog.get_event(EventId::new(id))?.is_some(),
        TargetType::Direction => services.catalog.get_direction(DirectionId::new(id))?.is_some(),
        TargetType::Application => services
            .catalog
            .get_application(ApplicationId::new(id))?
            .is_some(),
        TargetType::Project => true,
    })
}
