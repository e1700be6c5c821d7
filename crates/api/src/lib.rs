//! HTTP API: session boundary, routing, and request/response mapping.

pub mod app;
pub mod authz;
pub mod context;
pub mod cookies;
pub mod middleware;
