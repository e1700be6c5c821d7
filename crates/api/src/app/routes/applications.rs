use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    routing::get,
};

use crm_auth::ResourcePolicy;
use crm_catalog::{Application, ApplicationReview, CatalogStore};
use crm_core::ApplicationId;

use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::authz::PolicyGate;

/// Moderation of submitted applications (curators and admins).
pub fn router(services: &AppServices) -> Router {
    PolicyGate::new(services.roles.clone(), ResourcePolicy::curator_or_admin()).protect(
        Router::new()
            .route("/applications/", get(list_applications))
            .route(
                "/applications/:application_id/",
                get(get_application).put(review_application),
            ),
    )
}

pub async fn list_applications(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<Json<Vec<Application>>, ApiError> {
    Ok(Json(services.catalog.list_applications()?))
}

pub async fn get_application(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<ApplicationId>,
) -> Result<Json<Application>, ApiError> {
    let application = services
        .catalog
        .get_application(id)?
        .ok_or(ApiError::NotFound("application"))?;
    Ok(Json(application))
}

pub async fn review_application(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<ApplicationId>,
    Json(review): Json<ApplicationReview>,
) -> Result<Json<Application>, ApiError> {
    let application = services
        .catalog
        .review_application(id, review)?
        .ok_or(ApiError::NotFound("application"))?;
    tracing::info!(application_id = %id, approved = application.is_approved, "application reviewed");
    Ok(Json(application))
}
