//! Filter state and canonical filter spec construction
//!
//! Raw, UI-level filter state (free text plus scope flags plus structured
//! key/value filters) is folded into a canonical [`FilterSpec`] consumable by
//! a search-capable view constructor.
//!
//! [`FilterState`] snapshots are always replaced wholesale behind an `Arc`;
//! they are never mutated in place. That makes `Arc::ptr_eq` a correct and
//! cheap proxy for "no filter-relevant change", which is exactly the reuse
//! check the view lifecycle controller performs.

use std::collections::BTreeMap;
use std::sync::Arc;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Predicate key for the free-text sender scope.
pub const FILTER_KEY_AUTHOR: &str = "author";
/// Predicate key for the free-text recipients scope.
pub const FILTER_KEY_RECIPIENTS: &str = "recipients";
/// Predicate key for the free-text subject scope.
pub const FILTER_KEY_SUBJECT: &str = "subject";
/// Predicate key for the free-text body scope.
pub const FILTER_KEY_BODY: &str = "body";

bitflags! {
    /// Which fields the free-text filter applies to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct FilterScopes: u8 {
        const SENDER = 0b0001;
        const RECIPIENTS = 0b0010;
        const SUBJECT = 0b0100;
        const BODY = 0b1000;
    }
}

impl Default for FilterScopes {
    /// Sender, recipients and subject on; body off. Body search is the
    /// expensive one, so it is opt-in.
    fn default() -> Self {
        Self::SENDER | Self::RECIPIENTS | Self::SUBJECT
    }
}

/// Free-text filter: the text and the scopes it applies to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextFilter {
    pub text: String,
    pub scopes: FilterScopes,
}

impl TextFilter {
    pub fn new(text: impl Into<String>, scopes: FilterScopes) -> Self {
        Self {
            text: text.into(),
            scopes,
        }
    }
}

/// Complete raw filter state: free text plus structured key/value filters.
///
/// Held as `Arc<FilterState>` by the viewing state. Modification goes
/// through the copy-on-write helpers, which build a fresh snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    pub text_filter: TextFilter,
    pub structured: BTreeMap<String, String>,
}

impl FilterState {
    /// Whether this filter state warrants a search binding rather than a
    /// plain enumeration: free text at least `min_text_len` characters, or
    /// any structured filter present.
    pub fn wants_search(&self, min_text_len: usize) -> bool {
        self.text_filter.text.chars().count() >= min_text_len || !self.structured.is_empty()
    }

    /// New snapshot with the text filter replaced.
    pub fn with_text_filter(&self, text_filter: TextFilter) -> Arc<Self> {
        Arc::new(Self {
            text_filter,
            structured: self.structured.clone(),
        })
    }

    /// New snapshot with structured filter changes applied in order.
    /// A `None` value deletes the key.
    pub fn with_structured_changes(&self, changes: &[(String, Option<String>)]) -> Arc<Self> {
        let mut structured = self.structured.clone();
        for (key, value) in changes {
            match value {
                Some(value) => {
                    structured.insert(key.clone(), value.clone());
                }
                None => {
                    structured.remove(key);
                }
            }
        }
        Arc::new(Self {
            text_filter: self.text_filter.clone(),
            structured,
        })
    }
}

/// Canonical predicate set handed to a search-capable view constructor:
/// semantic predicate name to predicate value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec(BTreeMap<String, String>);

impl FilterSpec {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for FilterSpec {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Build the canonical filter spec from raw filter state.
///
/// Pure and deterministic: empty text contributes nothing; otherwise each
/// enabled scope maps to its predicate key with the filter text as value;
/// structured entries are copied verbatim afterwards, so on a key collision
/// the structured entry wins.
pub fn build_filter_spec(filtering: &FilterState) -> FilterSpec {
    let mut spec = FilterSpec::default();
    let text_filter = &filtering.text_filter;
    if !text_filter.text.is_empty() {
        if text_filter.scopes.contains(FilterScopes::SENDER) {
            spec.insert(FILTER_KEY_AUTHOR, text_filter.text.clone());
        }
        if text_filter.scopes.contains(FilterScopes::RECIPIENTS) {
            spec.insert(FILTER_KEY_RECIPIENTS, text_filter.text.clone());
        }
        if text_filter.scopes.contains(FilterScopes::SUBJECT) {
            spec.insert(FILTER_KEY_SUBJECT, text_filter.text.clone());
        }
        if text_filter.scopes.contains(FilterScopes::BODY) {
            spec.insert(FILTER_KEY_BODY, text_filter.text.clone());
        }
    }
    for (key, value) in &filtering.structured {
        spec.insert(key.clone(), value.clone());
    }
    spec
}
