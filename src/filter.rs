//! Subscription filters and matching.
//!
//! A filter is a set of predicates; absent predicates are wildcards. A record
//! matches a filter iff every present predicate is satisfied, and matches a
//! filter set iff at least one filter in the set matches.

use crate::event::Event;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Match predicates for a subscription request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Filter {
    /// Candidate event IDs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,

    /// Authors (pubkeys)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,

    /// Event kinds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kinds: Option<Vec<u16>>,

    /// Events created at or after this timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<u64>,

    /// Events created at or before this timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub until: Option<u64>,

    /// Maximum number of stored events the relay should return
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,

    /// Tag constraints keyed by `#<name>`, each mapping to an allowed value set
    #[serde(flatten, skip_serializing_if = "HashMap::is_empty")]
    pub tags: HashMap<String, Vec<String>>,
}

impl Filter {
    /// Create an empty (match-everything) filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to the given event IDs.
    pub fn ids(mut self, ids: Vec<String>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Restrict to the given authors.
    pub fn authors(mut self, authors: Vec<String>) -> Self {
        self.authors = Some(authors);
        self
    }

    /// Restrict to the given kinds.
    pub fn kinds(mut self, kinds: Vec<u16>) -> Self {
        self.kinds = Some(kinds);
        self
    }

    /// Only events created at or after `timestamp`.
    pub fn since(mut self, timestamp: u64) -> Self {
        self.since = Some(timestamp);
        self
    }

    /// Only events created at or before `timestamp`.
    pub fn until(mut self, timestamp: u64) -> Self {
        self.until = Some(timestamp);
        self
    }

    /// Ask the relay for at most `n` stored events.
    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    /// Constrain a tag. `name` is the bare tag letter, e.g. `"e"` or `"p"`.
    pub fn tag(mut self, name: impl Into<String>, values: Vec<String>) -> Self {
        self.tags.insert(format!("#{}", name.into()), values);
        self
    }

    /// Whether `event` satisfies every predicate present in this filter.
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(ids) = &self.ids {
            if !ids.iter().any(|id| *id == event.id) {
                return false;
            }
        }
        if let Some(kinds) = &self.kinds {
            if !kinds.contains(&event.kind) {
                return false;
            }
        }
        if let Some(authors) = &self.authors {
            if !authors.iter().any(|a| *a == event.pubkey) {
                return false;
            }
        }
        for (key, values) in &self.tags {
            let Some(name) = key.strip_prefix('#') else {
                continue;
            };
            let found = event.tags.iter().any(|tag| {
                tag.first().map(String::as_str) == Some(name)
                    && tag.get(1).is_some_and(|v| values.contains(v))
            });
            if !found {
                return false;
            }
        }
        if let Some(since) = self.since {
            if event.created_at < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if event.created_at > until {
                return false;
            }
        }
        true
    }
}

/// Whether `event` matches at least one filter in `filters`.
pub fn matches_any(filters: &[Filter], event: &Event) -> bool {
    filters.iter().any(|f| f.matches(event))
}
