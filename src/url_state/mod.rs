//! Two-way binding between a page's filter state and the URL query string.

pub mod schema;
pub mod sync;

pub use schema::{FilterSchema, FilterState, FilterValue};
pub use sync::{History, MemoryHistory, UrlSync, encode_query, parse_query, read_from_url, write_to_url};
