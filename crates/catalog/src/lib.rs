//! `crm-catalog`: events, directions and applications.
//!
//! Plain domain records and their validation rules (no IO, no HTTP). Storage is
//! reached through [`store::CatalogStore`].

pub mod application;
pub mod event;
pub mod store;

pub use application::{
    Application, ApplicationDraft, ApplicationReview, NewApplication, submit_application,
};
pub use event::{Direction, DirectionDraft, Event, EventDraft};
pub use store::{CatalogStore, CatalogStoreError};
