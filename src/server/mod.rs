//! HTTP front-end for the bridge.
//!
//! Exposes the discovery listing and the tool dispatch path. Every tool
//! registered from an announcement is immediately invocable here, exactly
//! like a statically defined operation would be.

mod routes;

pub use routes::{app_router, AppState};
