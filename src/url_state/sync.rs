use std::sync::{Arc, Mutex};

use reqwest::Url;
use tracing::debug;

use super::schema::{FilterSchema, FilterState};

/// The address bar, reduced to the query-string part.
pub trait History: Send + Sync {
    /// Current query string without the leading `?`.
    fn current_query(&self) -> String;
    /// Replace the current entry.
    fn replace_query(&self, query: &str);
    /// Add a new entry.
    fn push_query(&self, query: &str);
}

/// In-memory history. Records every entry so tests can tell a replace from
/// a push.
#[derive(Debug, Default, Clone)]
pub struct MemoryHistory {
    entries: Arc<Mutex<Vec<String>>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::with_query("")
    }

    pub fn with_query(query: &str) -> Self {
        Self {
            entries: Arc::new(Mutex::new(vec![query.trim_start_matches('?').to_string()])),
        }
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }
}

impl History for MemoryHistory {
    fn current_query(&self) -> String {
        self.entries
            .lock()
            .ok()
            .and_then(|e| e.last().cloned())
            .unwrap_or_default()
    }

    fn replace_query(&self, query: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            match entries.last_mut() {
                Some(last) => *last = query.to_string(),
                None => entries.push(query.to_string()),
            }
        }
    }

    fn push_query(&self, query: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(query.to_string());
        }
    }
}

/// Split a query string into decoded pairs.
pub fn parse_query(query: &str) -> Vec<(String, String)> {
    let query = query.trim_start_matches('?');
    if query.is_empty() {
        return Vec::new();
    }
    match Url::parse(&format!("lines:///?{}", query)) {
        Ok(url) => url.query_pairs().into_owned().collect(),
        Err(_) => Vec::new(),
    }
}

/// Encode pairs as a query string (no leading `?`).
pub fn encode_query(pairs: &[(String, String)]) -> String {
    if pairs.is_empty() {
        return String::new();
    }
    let mut url = match Url::parse("lines:///") {
        Ok(url) => url,
        Err(_) => return String::new(),
    };
    url.query_pairs_mut().extend_pairs(pairs);
    url.query().unwrap_or_default().to_string()
}

pub fn read_from_url(schema: &FilterSchema, history: &dyn History) -> FilterState {
    let pairs = parse_query(&history.current_query());
    schema.parse_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
}

/// Mirror `state` into the address bar, replacing the current entry.
pub fn write_to_url(state: &FilterState, schema: &FilterSchema, history: &dyn History) {
    let query = encode_query(&schema.to_pairs(state));
    if history.current_query() != query {
        debug!(%query, "Replacing URL query");
        history.replace_query(&query);
    }
}

/// Two-way binding between one page's filters and the address bar.
///
/// The state is rehydrated from the URL on construction and written back
/// after every change, so the two agree whenever a call returns.
pub struct UrlSync {
    schema: FilterSchema,
    history: Arc<dyn History>,
    state: FilterState,
}

impl UrlSync {
    pub fn new(schema: FilterSchema, history: Arc<dyn History>) -> Self {
        let state = read_from_url(&schema, history.as_ref());
        Self {
            schema,
            history,
            state,
        }
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    pub fn schema(&self) -> &FilterSchema {
        &self.schema
    }

    /// Apply filter changes (resetting the page when a filter changed) and
    /// write the result to the URL.
    pub fn update(&mut self, changes: FilterState) -> &FilterState {
        self.state = self.schema.apply(&self.state, changes);
        write_to_url(&self.state, &self.schema, self.history.as_ref());
        &self.state
    }

    pub fn set_page(&mut self, page: i64) -> &FilterState {
        match self.schema.page_field().map(str::to_string) {
            Some(field) => self.update(FilterState::from_iter([(field, page.max(1))])),
            None => &self.state,
        }
    }

    pub fn clear_filters(&mut self) -> &FilterState {
        self.state = self.schema.defaults();
        write_to_url(&self.state, &self.schema, self.history.as_ref());
        &self.state
    }

    /// Re-read the URL, e.g. after back/forward navigation.
    pub fn reload(&mut self) -> &FilterState {
        self.state = read_from_url(&self.schema, self.history.as_ref());
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::url_state::FilterValue;

    fn schema() -> FilterSchema {
        FilterSchema::new().page("page").field("category", "")
    }

    #[test]
    fn test_read_from_url() {
        let history = MemoryHistory::with_query("?category=AI&page=2");
        let state = read_from_url(&schema(), &history);
        assert_eq!(state.str("category"), "AI");
        assert_eq!(state.int("page"), Some(2));
    }

    #[test]
    fn test_all_defaults_write_empty_query() {
        let history = MemoryHistory::with_query("category=AI");
        write_to_url(&schema().defaults(), &schema(), &history);
        assert_eq!(history.current_query(), "");
    }

    #[test]
    fn test_write_replaces_instead_of_pushing() {
        let history = Arc::new(MemoryHistory::new());
        let mut sync = UrlSync::new(schema(), history.clone());
        sync.update(FilterState::from_iter([("category", "science")]));
        sync.set_page(3);
        assert_eq!(history.entries(), vec!["page=3&category=science".to_string()]);
    }

    #[test]
    fn test_values_are_percent_encoded() {
        let history = Arc::new(MemoryHistory::new());
        let mut sync = UrlSync::new(FilterSchema::new().field("search", ""), history.clone());
        sync.update(FilterState::from_iter([("search", "large models & agents")]));
        assert_eq!(history.current_query(), "search=large+models+%26+agents");

        let reread = read_from_url(sync.schema(), history.as_ref());
        assert_eq!(reread.str("search"), "large models & agents");
    }

    #[test]
    fn test_clear_filters_restores_defaults() {
        let history = Arc::new(MemoryHistory::with_query("category=tech&page=4"));
        let mut sync = UrlSync::new(schema(), history.clone());
        assert_eq!(sync.state().int("page"), Some(4));
        sync.clear_filters();
        assert_eq!(sync.state(), &schema().defaults());
        assert_eq!(history.current_query(), "");
    }

    #[test]
    fn test_reload_follows_navigation() {
        let history = Arc::new(MemoryHistory::new());
        let mut sync = UrlSync::new(schema(), history.clone());
        history.push_query("category=AI");
        assert_eq!(sync.reload().get("category"), Some(&FilterValue::Str("AI".into())));
    }

    #[test]
    fn test_parse_query_handles_empty() {
        assert!(parse_query("").is_empty());
        assert!(parse_query("?").is_empty());
    }
}
