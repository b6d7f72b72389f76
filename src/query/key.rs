use std::fmt;

use crate::url_state::{FilterState, FilterValue};

/// One primitive component of a query key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyPart {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl From<&str> for KeyPart {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for KeyPart {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<u32> for KeyPart {
    fn from(n: u32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<bool> for KeyPart {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&FilterValue> for KeyPart {
    fn from(v: &FilterValue) -> Self {
        match v {
            FilterValue::Str(s) => Self::Str(s.clone()),
            FilterValue::Int(n) => Self::Int(*n),
            FilterValue::Bool(b) => Self::Bool(*b),
        }
    }
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{:?}", s),
            Self::Int(n) => write!(f, "{}", n),
            Self::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// Structural identity of a query: resource name plus ordered parameters.
/// Equal keys address the same cache slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    resource: String,
    parts: Vec<KeyPart>,
}

impl QueryKey {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            parts: Vec::new(),
        }
    }

    pub fn with(mut self, part: impl Into<KeyPart>) -> Self {
        self.parts.push(part.into());
        self
    }

    /// Key for a filtered list: the resource followed by `name, value`
    /// pairs in filter-name order, so equal filter maps give equal keys.
    pub fn from_filters(resource: impl Into<String>, filters: &FilterState) -> Self {
        let mut key = Self::new(resource);
        for (name, value) in filters.iter() {
            key.parts.push(KeyPart::Str(name.clone()));
            key.parts.push(KeyPart::from(value));
        }
        key
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.parts
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}", self.resource)?;
        for part in &self.parts {
            write!(f, ", {}", part)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_parts_make_equal_keys() {
        let a = QueryKey::new("article").with("42").with(true);
        let b = QueryKey::new("article").with("42").with(true);
        assert_eq!(a, b);
        assert_ne!(a, QueryKey::new("article").with("42").with(false));
        assert_ne!(a, QueryKey::new("aiml-article").with("42").with(true));
    }

    #[test]
    fn test_from_filters_is_order_independent() {
        let mut f1 = FilterState::new();
        f1.set("page", FilterValue::Int(2));
        f1.set("category", FilterValue::Str("AI".into()));
        let mut f2 = FilterState::new();
        f2.set("category", FilterValue::Str("AI".into()));
        f2.set("page", FilterValue::Int(2));
        assert_eq!(
            QueryKey::from_filters("articles", &f1),
            QueryKey::from_filters("articles", &f2)
        );
    }

    #[test]
    fn test_display() {
        let key = QueryKey::new("articles").with("tech").with(3u32);
        assert_eq!(key.to_string(), r#"["articles", "tech", 3]"#);
    }
}
