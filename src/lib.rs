//! Two-phase blob store: clients register metadata, receive an upload target
//! keyed by an opaque id, then push the payload to that target.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
