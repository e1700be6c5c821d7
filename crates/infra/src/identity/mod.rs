//! Credential store and revocation list implementations.

pub mod in_memory;
pub mod postgres;

pub use in_memory::{InMemoryCredentialStore, InMemoryRevocationList};
pub use postgres::{PostgresCredentialStore, PostgresRevocationList, migrate};
