//! Receiver for signed ShotGrid webhook deliveries.
//!
//! Verified Task events are resolved to their parent entity, a pipeline
//! toolkit engine is bootstrapped for it, and the entity's USD master is
//! checked and created or replaced when needed.

pub mod app_state;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod router;
pub mod services;
pub mod startup;
pub mod utils;

pub use app_state::AppState;
pub use config::Config;
pub use error::ApiError;
