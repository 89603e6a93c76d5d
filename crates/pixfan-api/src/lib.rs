//! Pixfan API Library
//!
//! The axum service: the conversion endpoint and its direct upload variant,
//! the upload-event trigger that fans conversions out, image serving and
//! health probes.

mod api_doc;
mod handlers;
mod middleware;
mod services;
mod telemetry;
mod utils;

pub mod error;
pub mod setup;
pub mod state;

pub use api_doc::ApiDoc;
pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
pub use telemetry::init_tracing;
