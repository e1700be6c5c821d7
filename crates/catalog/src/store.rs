//! Storage port for catalog records.

use thiserror::Error;

use crm_core::{ApplicationId, DirectionId, EventId, UserId};

use crate::application::{Application, ApplicationReview, NewApplication};
use crate::event::{Direction, DirectionDraft, Event, EventDraft};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogStoreError {
    #[error("catalog store unavailable: {0}")]
    Unavailable(String),

    #[error("uniqueness conflict: {0}")]
    Conflict(String),
}

/// Events, their directions and applications.
///
/// Deleting an event deletes its directions. Applications survive deletions
/// with the dangling reference cleared.
pub trait CatalogStore: Send + Sync {
    fn list_events(&self) -> Result<Vec<Event>, CatalogStoreError>;
    fn get_event(&self, id: EventId) -> Result<Option<Event>, CatalogStoreError>;
    fn insert_event(&self, draft: EventDraft) -> Result<Event, CatalogStoreError>;
    fn update_event(&self, id: EventId, draft: EventDraft) -> Result<Option<Event>, CatalogStoreError>;
    /// Returns the removed event and the ids of the directions removed with it.
    fn delete_event(&self, id: EventId) -> Result<Option<(Event, Vec<DirectionId>)>, CatalogStoreError>;

    fn list_directions(&self, event: EventId) -> Result<Vec<Direction>, CatalogStoreError>;
    fn get_direction(&self, id: DirectionId) -> Result<Option<Direction>, CatalogStoreError>;
    fn insert_direction(&self, event: EventId, draft: DirectionDraft) -> Result<Direction, CatalogStoreError>;
    fn update_direction(&self, id: DirectionId, draft: DirectionDraft) -> Result<Option<Direction>, CatalogStoreError>;
    fn delete_direction(&self, id: DirectionId) -> Result<Option<Direction>, CatalogStoreError>;

    fn list_applications(&self) -> Result<Vec<Application>, CatalogStoreError>;
    fn get_application(&self, id: ApplicationId) -> Result<Option<Application>, CatalogStoreError>;
    fn has_application(&self, user: UserId, direction: DirectionId) -> Result<bool, CatalogStoreError>;
    /// Fails with `Conflict` if `(user, direction)` already has an application.
    fn insert_application(&self, new: NewApplication) -> Result<Application, CatalogStoreError>;
    fn review_application(
        &self,
        id: ApplicationId,
        review: ApplicationReview,
    ) -> Result<Option<Application>, CatalogStoreError>;
}

impl<S> CatalogStore for std::sync::Arc<S>
where
    S: CatalogStore + ?Sized,
{
    fn list_events(&self) -> Result<Vec<Event>, CatalogStoreError> {
        (**self).list_events()
    }
    fn get_event(&self, id: EventId) -> Result<Option<Event>, CatalogStoreError> {
        (**self).get_event(id)
    }
    fn insert_event(&self, draft: EventDraft) -> Result<Event, CatalogStoreError> {
        (**self).insert_event(draft)
    }
    fn update_event(&self, id: EventId, draft: EventDraft) -> Result<Option<Event>, CatalogStoreError> {
        (**self).update_event(id, draft)
    }
    fn delete_event(&self, id: EventId) -> Result<Option<(Event, Vec<DirectionId>)>, CatalogStoreError> {
        (**self).delete_event(id)
    }
    fn list_directions(&self, event: EventId) -> Result<Vec<Direction>, CatalogStoreError> {
        (**self).list_directions(event)
    }
    fn get_direction(&self, id: DirectionId) -> Result<Option<Direction>, CatalogStoreError> {
        (**self).get_direction(id)
    }
    fn insert_direction(&self, event: EventId, draft: DirectionDraft) -> Result<Direction, CatalogStoreError> {
        (**self).insert_direction(event, draft)
    }
    fn update_direction(&self, id: DirectionId, draft: DirectionDraft) -> Result<Option<Direction>, CatalogStoreError> {
        (**self).update_direction(id, draft)
    }
    fn delete_direction(&self, id: DirectionId) -> Result<Option<Direction>, CatalogStoreError> {
        (**self).delete_direction(id)
    }
    fn list_applications(&self) -> Result<Vec<Application>, CatalogStoreError> {
        (**self).list_applications()
    }
    fn get_application(&self, id: ApplicationId) -> Result<Option<Application>, CatalogStoreError> {
        (**self).get_application(id)
    }
    fn has_application(&self, user: UserId, direction: DirectionId) -> Result<bool, CatalogStoreError> {
        (**self).has_application(user, direction)
    }
    fn insert_application(&self, new: NewApplication) -> Result<Application, CatalogStoreError> {
        (**self).insert_application(new)
    }
    fn review_application(
        &self,
        id: ApplicationId,
        review: ApplicationReview,
    ) -> Result<Option<Application>, CatalogStoreError> {
        (**self).review_application(id, review)
    }
}
