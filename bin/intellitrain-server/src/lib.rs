//! intellitrain-server: HTTP backend for training audio and image
//! classifiers from user-labeled samples.
//!
//! The binary in `main.rs` wires configuration, tracing and the database
//! together; everything else lives here so integration tests can build the
//! same router.

pub mod config;
pub mod entities;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod schemas;
pub mod services;
pub mod state;

pub use config::Config;
pub use entities::SqliteStore;
pub use routes::build as build_router;
pub use state::AppState;
