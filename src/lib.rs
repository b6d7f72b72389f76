//! Client core for the Lines news reader.
//!
//! Everything below the views lives here: the authenticated HTTP client and
//! per-resource services, the query cache the views read through, URL-synced
//! filter state, and the session lifecycle.

pub mod app;
pub mod config;
pub mod display;
pub mod errors;
pub mod http;
pub mod logging;
pub mod pages;
pub mod query;
pub mod services;
pub mod session;
pub mod url_state;
pub mod validators;

pub use app::LinesApp;
pub use config::ClientConfig;
pub use errors::{ApiError, ConfigError, SessionError};
