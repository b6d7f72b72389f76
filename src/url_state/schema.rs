use std::collections::BTreeMap;
use std::fmt;

/// A scalar filter value as it appears in the query string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FilterValue {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl FilterValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Parse `raw` as the same kind as `self`.
    fn parse_like(&self, raw: &str) -> Option<FilterValue> {
        match self {
            Self::Str(_) => Some(Self::Str(raw.to_string())),
            Self::Int(_) => raw.trim().parse().ok().map(Self::Int),
            Self::Bool(_) => match raw.trim() {
                "true" | "1" => Some(Self::Bool(true)),
                "false" | "0" => Some(Self::Bool(false)),
                _ => None,
            },
        }
    }

    /// Coerce an incoming value to the kind of `self`. Strings are parsed,
    /// mismatched scalars are rejected.
    fn coerce_like(&self, value: FilterValue) -> Option<FilterValue> {
        match (self, value) {
            (Self::Str(_), v @ Self::Str(_))
            | (Self::Int(_), v @ Self::Int(_))
            | (Self::Bool(_), v @ Self::Bool(_)) => Some(v),
            (_, Self::Str(raw)) => self.parse_like(&raw),
            _ => None,
        }
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(n) => write!(f, "{}", n),
            Self::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for FilterValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<bool> for FilterValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Flat filter-name to scalar map for one page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    values: BTreeMap<String, FilterValue>,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&FilterValue> {
        self.values.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<FilterValue>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn str(&self, name: &str) -> &str {
        self.get(name).and_then(FilterValue::as_str).unwrap_or("")
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(FilterValue::as_int)
    }

    pub fn bool(&self, name: &str) -> bool {
        self.get(name).and_then(FilterValue::as_bool).unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FilterValue)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<FilterValue>> FromIterator<(K, V)> for FilterState {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Declared filter fields of one page and their defaults. The default also
/// fixes each field's kind.
#[derive(Debug, Clone)]
pub struct FilterSchema {
    fields: Vec<(String, FilterValue)>,
    page_field: Option<String>,
}

impl FilterSchema {
    pub fn new() -> Self {
        Self {
            fields: Vec::new(),
            page_field: None,
        }
    }

    pub fn field(mut self, name: impl Into<String>, default: impl Into<FilterValue>) -> Self {
        self.fields.push((name.into(), default.into()));
        self
    }

    /// Declare the pagination field. It defaults to 1 and is reset whenever
    /// another field changes.
    pub fn page(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.fields.push((name.clone(), FilterValue::Int(1)));
        self.page_field = Some(name);
        self
    }

    pub fn page_field(&self) -> Option<&str> {
        self.page_field.as_deref()
    }

    pub fn default_of(&self, name: &str) -> Option<&FilterValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, d)| d)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.fields.iter().map(|(n, d)| (n.as_str(), d))
    }

    pub fn defaults(&self) -> FilterState {
        self.fields.iter().map(|(n, d)| (n.clone(), d.clone())).collect()
    }

    /// Pages start at 1.
    fn clamp_page(&self, name: &str, value: FilterValue) -> FilterValue {
        match value {
            FilterValue::Int(n) if n < 1 && self.page_field.as_deref() == Some(name) => {
                FilterValue::Int(1)
            }
            other => other,
        }
    }

    /// Build a state from raw query pairs. Undeclared keys are ignored,
    /// absent or unparsable values take the default.
    pub fn parse_pairs<'a>(&self, pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> FilterState {
        let raw: BTreeMap<&str, &str> = pairs.into_iter().collect();
        self.fields
            .iter()
            .map(|(name, default)| {
                let value = raw
                    .get(name.as_str())
                    .and_then(|r| default.parse_like(r))
                    .unwrap_or_else(|| default.clone());
                (name.clone(), self.clamp_page(name, value))
            })
            .collect()
    }

    /// Query pairs for `state`, in declaration order, omitting values equal
    /// to their default.
    pub fn to_pairs(&self, state: &FilterState) -> Vec<(String, String)> {
        self.fields
            .iter()
            .filter_map(|(name, default)| {
                let value = state.get(name)?;
                (value != default).then(|| (name.clone(), value.to_string()))
            })
            .collect()
    }

    /// Merge `changes` into `current`. Undeclared or ill-typed changes are
    /// dropped. When any non-page field actually changes and the changes do
    /// not set the page themselves, the page goes back to 1.
    pub fn apply(&self, current: &FilterState, changes: FilterState) -> FilterState {
        let mut next = current.clone();
        let mut filter_changed = false;
        let mut page_set = false;

        for (name, value) in changes.values {
            let Some(default) = self.default_of(&name) else {
                continue;
            };
            let Some(value) = default.coerce_like(value) else {
                continue;
            };
            let value = self.clamp_page(&name, value);
            if self.page_field.as_deref() == Some(name.as_str()) {
                page_set = true;
            } else if current.get(&name) != Some(&value) {
                filter_changed = true;
            }
            next.values.insert(name, value);
        }

        if filter_changed
            && !page_set
            && let Some(page) = &self.page_field
        {
            next.values.insert(page.clone(), FilterValue::Int(1));
        }
        next
    }
}

impl Default for FilterSchema {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> FilterSchema {
        FilterSchema::new()
            .page("page")
            .field("category", "")
            .field("featured", false)
    }

    #[test]
    fn test_parse_pairs_applies_defaults_and_coerces() {
        let state = schema().parse_pairs([("category", "AI"), ("page", "2")]);
        assert_eq!(state.int("page"), Some(2));
        assert_eq!(state.str("category"), "AI");
        assert!(!state.bool("featured"));
    }

    #[test]
    fn test_unparsable_value_falls_back_to_default() {
        let state = schema().parse_pairs([("page", "two"), ("featured", "maybe")]);
        assert_eq!(state.int("page"), Some(1));
        assert!(!state.bool("featured"));
    }

    #[test]
    fn test_page_below_one_is_clamped() {
        let s = schema();
        assert_eq!(s.parse_pairs([("page", "-3")]).int("page"), Some(1));
        assert_eq!(s.parse_pairs([("page", "0")]).int("page"), Some(1));
        assert_eq!(s.apply(&s.defaults(), FilterState::from_iter([("page", 0i64)])).int("page"), Some(1));
        assert!(s.to_pairs(&s.parse_pairs([("page", "-3")])).is_empty());
    }

    #[test]
    fn test_undeclared_keys_are_ignored() {
        let state = schema().parse_pairs([("utm_source", "mail")]);
        assert!(state.get("utm_source").is_none());
        assert_eq!(state, schema().defaults());
    }

    #[test]
    fn test_to_pairs_omits_defaults() {
        let s = schema();
        assert!(s.to_pairs(&s.defaults()).is_empty());

        let state = s.apply(&s.defaults(), FilterState::from_iter([("featured", true)]));
        assert_eq!(s.to_pairs(&state), vec![("featured".to_string(), "true".to_string())]);
    }

    #[test]
    fn test_filter_change_resets_page() {
        let s = FilterSchema::new().page("page").field("category", "");
        let current: FilterState =
            [("page", FilterValue::Int(3)), ("category", "tech".into())].into_iter().collect();
        let next = s.apply(&current, FilterState::from_iter([("category", "science")]));
        assert_eq!(next.int("page"), Some(1));
        assert_eq!(next.str("category"), "science");
    }

    #[test]
    fn test_page_change_keeps_filters() {
        let s = schema();
        let current = s.apply(&s.defaults(), FilterState::from_iter([("category", "tech")]));
        let next = s.apply(&current, FilterState::from_iter([("page", 4i64)]));
        assert_eq!(next.int("page"), Some(4));
        assert_eq!(next.str("category"), "tech");
    }

    #[test]
    fn test_setting_same_value_does_not_reset_page() {
        let s = schema();
        let current = s.apply(
            &s.defaults(),
            [("category", FilterValue::from("tech")), ("page", FilterValue::Int(3))]
                .into_iter()
                .collect(),
        );
        let next = s.apply(&current, FilterState::from_iter([("category", "tech")]));
        assert_eq!(next.int("page"), Some(3));
    }

    #[test]
    fn test_apply_coerces_string_input() {
        let s = schema();
        let next = s.apply(&s.defaults(), FilterState::from_iter([("page", "5")]));
        assert_eq!(next.int("page"), Some(5));
        let ignored = s.apply(&s.defaults(), FilterState::from_iter([("page", true)]));
        assert_eq!(ignored.int("page"), Some(1));
    }
}
