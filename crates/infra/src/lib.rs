//! Infrastructure layer: stores, mail transports, configuration.

pub mod catalog;
pub mod config;
pub mod identity;
pub mod mail;
pub mod reconcile;

mod integration_tests;

pub use catalog::InMemoryCatalogStore;
pub use config::{AdminSeed, AppConfig, ConfigError};
pub use identity::{
    InMemoryCredentialStore, InMemoryRevocationList, PostgresCredentialStore,
    PostgresRevocationList,
};
pub use mail::{InMemoryOutbox, LogMailer};
pub use reconcile::{
    ReconcileError, ReconcileReport, delete_direction_cascading, delete_event_cascading,
    reconcile_role_targets,
};
