//! Events, their directions, and application submission.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, post},
};
use chrono::Utc;

use crm_auth::ResourcePolicy;
use crm_catalog::{
    Application, ApplicationDraft, CatalogStore, Direction, DirectionDraft, Event, EventDraft,
    submit_application,
};
use crm_core::{DirectionId, EventId};
use crm_infra::{delete_direction_cascading, delete_event_cascading};

use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::authz::PolicyGate;
use crate::context::PrincipalContext;

pub fn router(services: &AppServices) -> Router {
    let catalog = Router::new()
        .route("/events/", get(list_events).post(create_event))
        .route(
            "/events/:event_id/",
            get(get_event).put(update_event).delete(delete_event),
        )
        .route(
            "/events/:event_id/directions/",
            get(list_directions).post(create_direction),
        )
        .route(
            "/events/:event_id/directions/:direction_id/",
            get(get_direction).put(update_direction).delete(delete_direction),
        );

    let submissions = Router::new().route(
        "/events/:event_id/directions/:direction_id/applications/",
        post(submit),
    );

    PolicyGate::new(
        services.roles.clone(),
        ResourcePolicy::projectant_read_curator_admin_write(),
    )
    .protect(catalog)
    .merge(PolicyGate::new(services.roles.clone(), ResourcePolicy::projectant_only()).protect(submissions))
}

fn load_event(services: &AppServices, id: EventId) -> Result<Event, ApiError> {
    services.catalog.get_event(id)?.ok_or(ApiError::NotFound("event"))
}

/// A direction addressed through an event it does not belong to is not found.
fn load_direction(services: &AppServices, event: EventId, id: DirectionId) -> Result<Direction, ApiError> {
    services
        .catalog
        .get_direction(id)?
        .filter(|d| d.event == event)
        .ok_or(ApiError::NotFound("direction"))
}

pub async fn list_events(Extension(services): Extension<Arc<AppServices>>) -> Result<Json<Vec<Event>>, ApiError> {
    Ok(Json(services.catalog.list_events()?))
}

pub async fn create_event(
    Extension(services): Extension<Arc<AppServices>>,
    Json(draft): Json<EventDraft>,
) -> Result<(StatusCode, Json<Event>), ApiError> {
    draft.validate()?;
    let event = services.catalog.insert_event(draft)?;
    tracing::info!(event_id = %event.id, "event created");
    Ok((StatusCode::CREATED, Json(event)))
}

pub async fn get_event(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<EventId>,
) -> Result<Json<Event>, ApiError> {
    Ok(Json(load_event(&services, id)?))
}

pub async fn update_event(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<EventId>,
    Json(draft): Json<EventDraft>,
) -> Result<Json<Event>, ApiError> {
    draft.validate()?;
    let event = services
        .catalog
        .update_event(id, draft)?
        .ok_or(ApiError::NotFound("event"))?;
    Ok(Json(event))
}

/// DELETE /events/:event_id/ - also drops roles scoped to the event or its directions.
pub async fn delete_event(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<EventId>,
) -> Result<StatusCode, ApiError> {
    delete_event_cascading(&*services.catalog, &*services.credentials, id)?
        .ok_or(ApiError::NotFound("event"))?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_directions(
    Extension(services): Extension<Arc<AppServices>>,
    Path(event_id): Path<EventId>,
) -> Result<Json<Vec<Direction>>, ApiError> {
    let event = load_event(&services, event_id)?;
    Ok(Json(services.catalog.list_directions(event.id)?))
}

pub async fn create_direction(
    Extension(services): Extension<Arc<AppServices>>,
    Path(event_id): Path<EventId>,
    Json(draft): Json<DirectionDraft>,
) -> Result<(StatusCode, Json<Direction>), ApiError> {
    draft.validate()?;
    let event = load_event(&services, event_id)?;
    let direction = services.catalog.insert_direction(event.id, draft)?;
    Ok((StatusCode::CREATED, Json(direction)))
}

pub async fn get_direction(
    Extension(services): Extension<Arc<AppServices>>,
    Path((event_id, direction_id)): Path<(EventId, DirectionId)>,
) -> Result<Json<Direction>, ApiError> {
    Ok(Json(load_direction(&services, event_id, direction_id)?))
}

pub async fn update_direction(
    Extension(services): Extension<Arc<AppServices>>,
    Path((event_id, direction_id)): Path<(EventId, DirectionId)>,
    Json(draft): Json<DirectionDraft>,
) -> Result<Json<Direction>, ApiError> {
    draft.validate()?;
    load_direction(&services, event_id, direction_id)?;
    let direction = services
        .catalog
        .update_direction(direction_id, draft)?
        .ok_or(ApiError::NotFound("direction"))?;
    Ok(Json(direction))
}

pub async fn delete_direction(
    Extension(services): Extension<Arc<AppServices>>,
    Path((event_id, direction_id)): Path<(EventId, DirectionId)>,
) -> Result<StatusCode, ApiError> {
    load_direction(&services, event_id, direction_id)?;
    delete_direction_cascading(&*services.catalog, &*services.credentials, direction_id)?
        .ok_or(ApiError::NotFound("direction"))?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /events/:event_id/directions/:direction_id/applications/
pub async fn submit(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(context): Extension<PrincipalContext>,
    Path((event_id, direction_id)): Path<(EventId, DirectionId)>,
    Json(draft): Json<ApplicationDraft>,
) -> Result<(StatusCode, Json<Application>), ApiError> {
    let user = context.require_user()?.id;
    let event = load_event(&services, event_id)?;
    let direction = load_direction(&services, event_id, direction_id)?;

    let already_applied = services.catalog.has_application(user, direction.id)?;
    let new = submit_application(draft, user, &event, &direction, already_applied, Utc::now())?;
    let application = services.catalog.insert_application(new)?;
    tracing::info!(
        application_id = %application.id,
        user_id = %user,
        direction_id = %direction.id,
        "application submitted"
    );
    Ok((StatusCode::CREATED, Json(application)))
}
