use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use crate::TableKey;

/// What a fetch retrieves. Doubles as the de-duplication key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FetchKey {
    SchemaList,
    SchemaObjects { schema: String },
    TableDetail(TableKey),
}

impl FetchKey {
    pub fn schema_objects(schema: impl Into<String>) -> Self {
        Self::SchemaObjects {
            schema: schema.into(),
        }
    }

    pub fn table_detail(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self::TableDetail(TableKey::new(schema, table))
    }
}

impl fmt::Display for FetchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchKey::SchemaList => write!(f, "schemas"),
            FetchKey::SchemaObjects { schema } => write!(f, "schema {}", schema),
            FetchKey::TableDetail(key) => write!(f, "table {}", key),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InFlightSnapshot {
    pub key: FetchKey,
    pub elapsed_secs: f64,
}

/// Outstanding fetches, at most one per key.
#[derive(Debug, Default)]
pub struct FetchTracker {
    started: HashMap<FetchKey, Instant>,
}

impl FetchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fetch. Returns `false` if one for the same key is already
    /// outstanding, in which case the caller must not issue another.
    pub fn begin(&mut self, key: FetchKey) -> bool {
        if self.started.contains_key(&key) {
            return false;
        }

        log::debug!("Fetching {}", key);
        self.started.insert(key, Instant::now());
        true
    }

    /// Removes a fetch and returns how long it was outstanding.
    pub fn finish(&mut self, key: &FetchKey) -> Option<Duration> {
        self.started.remove(key).map(|started| started.elapsed())
    }

    pub fn len(&self) -> usize {
        self.started.len()
    }

    pub fn is_empty(&self) -> bool {
        self.started.is_empty()
    }

    pub fn snapshot(&self) -> Vec<InFlightSnapshot> {
        let mut items: Vec<_> = self
            .started
            .iter()
            .map(|(key, started)| InFlightSnapshot {
                key: key.clone(),
                elapsed_secs: started.elapsed().as_secs_f64(),
            })
            .collect();

        items.sort_by(|a, b| b.elapsed_secs.total_cmp(&a.elapsed_secs));
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_rejects_duplicates_until_finished() {
        let mut tracker = FetchTracker::new();
        let key = FetchKey::schema_objects("public");

        assert!(tracker.begin(key.clone()));
        assert!(!tracker.begin(key.clone()));
        assert_eq!(tracker.len(), 1);

        assert!(tracker.finish(&key).is_some());
        assert!(tracker.is_empty());
        assert!(tracker.finish(&key).is_none());
        assert!(tracker.begin(key));
    }

    #[test]
    fn distinct_keys_run_side_by_side() {
        let mut tracker = FetchTracker::new();

        assert!(tracker.begin(FetchKey::SchemaList));
        assert!(tracker.begin(FetchKey::schema_objects("a")));
        assert!(tracker.begin(FetchKey::schema_objects("b")));
        assert!(tracker.begin(FetchKey::table_detail("a", "users")));

        assert_eq!(tracker.snapshot().len(), 4);
    }

    #[test]
    fn display_names_the_target() {
        assert_eq!(FetchKey::SchemaList.to_string(), "schemas");
        assert_eq!(
            FetchKey::table_detail("public", "users").to_string(),
            "table public.users"
        );
    }
}
