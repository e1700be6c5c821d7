use std::collections::BTreeMap;
use std::sync::RwLock;

use crm_catalog::{
    Application, ApplicationReview, CatalogStore, CatalogStoreError, Direction, DirectionDraft,
    Event, EventDraft, NewApplication,
};
use crm_core::{ApplicationId, DirectionId, EventId, UserId};

#[derive(Debug, Default)]
struct Tables {
    events: BTreeMap<EventId, Event>,
    directions: BTreeMap<DirectionId, Direction>,
    applications: BTreeMap<ApplicationId, Application>,
    next_event: i64,
    next_direction: i64,
    next_application: i64,
}

fn poisoned() -> CatalogStoreError {
    CatalogStoreError::Unavailable("lock poisoned".to_string())
}

/// In-memory catalog store (tests/dev).
#[derive(Debug, Default)]
pub struct InMemoryCatalogStore {
    tables: RwLock<Tables>,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Tables {
    fn detach_direction(&mut self, id: DirectionId) {
        for app in self.applications.values_mut() {
            if app.direction == Some(id) {
                app.direction = None;
            }
        }
    }
}

impl CatalogStore for InMemoryCatalogStore {
    fn list_events(&self) -> Result<Vec<Event>, CatalogStoreError> {
        let t = self.tables.read().map_err(|_| poisoned())?;
        Ok(t.events.values().cloned().collect())
    }

    fn get_event(&self, id: EventId) -> Result<Option<Event>, CatalogStoreError> {
        let t = self.tables.read().map_err(|_| poisoned())?;
        Ok(t.events.get(&id).cloned())
    }

    fn insert_event(&self, draft: EventDraft) -> Result<Event, CatalogStoreError> {
        let mut t = self.tables.write().map_err(|_| poisoned())?;
        t.next_event += 1;
        let event = draft.into_event(EventId::new(t.next_event));
        t.events.insert(event.id, event.clone());
        Ok(event)
    }

    fn update_event(&self, id: EventId, draft: EventDraft) -> Result<Option<Event>, CatalogStoreError> {
        let mut t = self.tables.write().map_err(|_| poisoned())?;
        let Some(slot) = t.events.get_mut(&id) else {
            return Ok(None);
        };
        *slot = draft.into_event(id);
        Ok(Some(slot.clone()))
    }

    fn delete_event(&self, id: EventId) -> Result<Option<(Event, Vec<DirectionId>)>, CatalogStoreError> {
        let mut t = self.tables.write().map_err(|_| poisoned())?;
        let Some(event) = t.events.remove(&id) else {
            return Ok(None);
        };

        let doomed: Vec<DirectionId> = t
            .directions
            .values()
            .filter(|d| d.event == id)
            .map(|d| d.id)
            .collect();
        for d in &doomed {
            t.directions.remove(d);
            t.detach_direction(*d);
        }
        for app in t.applications.values_mut() {
            if app.event == Some(id) {
                app.event = None;
            }
        }
        Ok(Some((event, doomed)))
    }

    fn list_directions(&self, event: EventId) -> Result<Vec<Direction>, CatalogStoreError> {
        let t = self.tables.read().map_err(|_| poisoned())?;
        Ok(t.directions.values().filter(|d| d.event == event).cloned().collect())
    }

    fn get_direction(&self, id: DirectionId) -> Result<Option<Direction>, CatalogStoreError> {
        let t = self.tables.read().map_err(|_| poisoned())?;
        Ok(t.directions.get(&id).cloned())
    }

    fn insert_direction(&self, event: EventId, draft: DirectionDraft) -> Result<Direction, CatalogStoreError> {
        let mut t = self.tables.write().map_err(|_| poisoned())?;
        if !t.events.contains_key(&event) {
            return Err(CatalogStoreError::Conflict(format!("event {event} does not exist")));
        }
        t.next_direction += 1;
        let direction = draft.into_direction(DirectionId::new(t.next_direction), event);
        t.directions.insert(direction.id, direction.clone());
        Ok(direction)
    }

    fn update_direction(&self, id: DirectionId, draft: DirectionDraft) -> Result<Option<Direction>, CatalogStoreError> {
        let mut t = self.tables.write().map_err(|_| poisoned())?;
        let Some(slot) = t.directions.get_mut(&id) else {
            return Ok(None);
        };
        *slot = draft.into_direction(id, slot.event);
        Ok(Some(slot.clone()))
    }

    fn delete_direction(&self, id: DirectionId) -> Result<Option<Direction>, CatalogStoreError> {
        let mut t = self.tables.write().map_err(|_| poisoned())?;
        let removed = t.directions.remove(&id);
        if removed.is_some() {
            t.detach_direction(id);
        }
        Ok(removed)
    }

    fn list_applications(&self) -> Result<Vec<Application>, CatalogStoreError> {
        let t = self.tables.read().map_err(|_| poisoned())?;
        Ok(t.applications.values().cloned().collect())
    }

    fn get_application(&self, id: ApplicationId) -> Result<Option<Application>, CatalogStoreError> {
        let t = self.tables.read().map_err(|_| poisoned())?;
        Ok(t.applications.get(&id).cloned())
    }

    fn has_application(&self, user: UserId, direction: DirectionId) -> Result<bool, CatalogStoreError> {
        let t = self.tables.read().map_err(|_| poisoned())?;
        Ok(t
            .applications
            .values()
            .any(|a| a.user == user && a.direction == Some(direction)))
    }

    fn insert_application(&self, new: NewApplication) -> Result<Application, CatalogStoreError> {
        let mut t = self.tables.write().map_err(|_| poisoned())?;
        if t
            .applications
            .values()
            .any(|a| a.user == new.user && a.direction == Some(new.direction))
        {
            return Err(CatalogStoreError::Conflict(format!(
                "user {} already applied to direction {}",
                new.user, new.direction
            )));
        }
        t.next_application += 1;
        let app = new.into_application(ApplicationId::new(t.next_application));
        t.applications.insert(app.id, app.clone());
        Ok(app)
    }

    fn review_application(
        &self,
        id: ApplicationId,
        review: ApplicationReview,
    ) -> Result<Option<Application>, CatalogStoreError> {
        let mut t = self.tables.write().map_err(|_| poisoned())?;
        let Some(app) = t.applications.get_mut(&id) else {
            return Ok(None);
        };
        app.apply_review(review);
        Ok(Some(app.clone()))
    }
}
