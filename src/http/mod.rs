//! Outbound HTTP: one configured client shared by every service module.

pub mod client;

pub use client::{HttpClient, RawResponse, RequestOptions};
pub use reqwest::Method;
