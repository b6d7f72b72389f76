//! Shared wire and domain types for the Lines client.
//!
//! Every payload the REST backend returns is wrapped in an [`Envelope`]. The
//! records inside are normalized into one canonical shape per entity here, so
//! the client core never deals with per-endpoint field-name drift.

pub mod envelope;
pub mod models;
pub mod pagination;

pub use envelope::{Envelope, FieldError};
pub use models::*;
pub use pagination::{Page, Pagination};
