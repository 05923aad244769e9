use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::{SchemaContents, TableDetail};

/// Cache key of a table's detail entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableKey {
    pub schema: String,
    pub table: String,
}

impl TableKey {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// Memoized metadata for the current session.
///
/// Entries are written once and never replaced or evicted; a second write for
/// the same key keeps the first value. Size is bounded by the schemas and
/// tables the user actually browses.
#[derive(Debug, Default)]
pub struct MetadataCache {
    schemas: HashMap<String, Arc<SchemaContents>>,
    tables: HashMap<TableKey, Arc<TableDetail>>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_schema_contents(&self, schema: &str) -> Option<Arc<SchemaContents>> {
        self.schemas.get(schema).cloned()
    }

    /// Stores the contents of a schema and returns the cached value.
    pub fn put_schema_contents(
        &mut self,
        schema: impl Into<String>,
        contents: SchemaContents,
    ) -> Arc<SchemaContents> {
        let schema = schema.into();

        if let Some(existing) = self.schemas.get(&schema) {
            log::debug!("Schema contents for {} already cached, keeping first", schema);
            return existing.clone();
        }

        let contents = Arc::new(contents);
        self.schemas.insert(schema, contents.clone());
        contents
    }

    pub fn get_table_detail(&self, key: &TableKey) -> Option<Arc<TableDetail>> {
        self.tables.get(key).cloned()
    }

    /// Stores the detail of a table and returns the cached value.
    pub fn put_table_detail(&mut self, key: TableKey, detail: TableDetail) -> Arc<TableDetail> {
        if let Some(existing) = self.tables.get(&key) {
            log::debug!("Table detail for {} already cached, keeping first", key);
            return existing.clone();
        }

        let detail = Arc::new(detail);
        self.tables.insert(key, detail.clone());
        detail
    }

    pub fn has_schema(&self, schema: &str) -> bool {
        self.schemas.contains_key(schema)
    }

    pub fn has_table(&self, key: &TableKey) -> bool {
        self.tables.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_your_writes() {
        let mut cache = MetadataCache::new();
        assert!(cache.get_schema_contents("public").is_none());

        let contents = SchemaContents {
            tables: vec!["users".into()],
            ..SchemaContents::default()
        };
        cache.put_schema_contents("public", contents.clone());

        assert_eq!(*cache.get_schema_contents("public").unwrap(), contents);
        assert!(cache.has_schema("public"));
        assert!(!cache.has_schema("other"));
    }

    #[test]
    fn first_write_wins() {
        let mut cache = MetadataCache::new();
        let key = TableKey::new("public", "users");

        let first = TableDetail::default();
        let mut second = TableDetail::default();
        second.indexes.push(crate::IndexInfo {
            name: "pk".into(),
            index_type: crate::IndexType::Primary,
            columns: vec!["id".into()],
            is_unique: true,
        });

        cache.put_table_detail(key.clone(), first.clone());
        let kept = cache.put_table_detail(key.clone(), second);

        assert_eq!(*kept, first);
        assert_eq!(*cache.get_table_detail(&key).unwrap(), first);
    }

    #[test]
    fn table_keys_are_scoped_by_schema() {
        let mut cache = MetadataCache::new();
        cache.put_table_detail(TableKey::new("a", "users"), TableDetail::default());

        assert!(cache.has_table(&TableKey::new("a", "users")));
        assert!(!cache.has_table(&TableKey::new("b", "users")));
        assert_eq!(TableKey::new("a", "users").to_string(), "a.users");
    }
}
