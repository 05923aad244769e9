use async_trait::async_trait;
use dbtree_core::{MetadataFetcher, SchemaContents, TableDetail, TreeError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone, Default)]
pub struct FakeFetcherStats {
    pub list_calls: usize,
    pub schema_calls: Vec<String>,
    pub table_calls: Vec<(String, String)>,
}

impl FakeFetcherStats {
    pub fn schema_call_count(&self, schema: &str) -> usize {
        self.schema_calls.iter().filter(|s| *s == schema).count()
    }

    pub fn table_call_count(&self, schema: &str, table: &str) -> usize {
        self.table_calls
            .iter()
            .filter(|(s, t)| s == schema && t == table)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.list_calls + self.schema_calls.len() + self.table_calls.len()
    }
}

type TableRef = (String, String);

#[derive(Default)]
struct FakeFetcherState {
    schemas: RwLock<Vec<String>>,
    schema_objects: RwLock<HashMap<String, SchemaContents>>,
    table_details: RwLock<HashMap<TableRef, TableDetail>>,
    list_error: RwLock<Option<String>>,
    schema_errors: RwLock<HashMap<String, String>>,
    table_errors: RwLock<HashMap<TableRef, String>>,
    list_calls: AtomicUsize,
    schema_calls: Mutex<Vec<String>>,
    table_calls: Mutex<Vec<TableRef>>,
}

/// In-memory metadata backend with scripted answers and failures.
///
/// Clones share state, so a test can hand one clone to the store and keep
/// another to inspect calls or inject errors.
#[derive(Clone, Default)]
pub struct FakeFetcher {
    state: Arc<FakeFetcherState>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schemas<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *write(&self.state.schemas) = names.into_iter().map(Into::into).collect();
        self
    }

    /// Registers the objects of a schema, listing the schema if it is new.
    pub fn with_schema_objects(self, schema: impl Into<String>, contents: SchemaContents) -> Self {
        self.set_schema_objects(schema, contents);
        self
    }

    pub fn with_table_detail(
        self,
        schema: impl Into<String>,
        table: impl Into<String>,
        detail: TableDetail,
    ) -> Self {
        self.set_table_detail(schema, table, detail);
        self
    }

    pub fn with_schema_error(self, schema: impl Into<String>, message: impl Into<String>) -> Self {
        self.set_schema_error(schema, message);
        self
    }

    pub fn with_table_error(
        self,
        schema: impl Into<String>,
        table: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        write(&self.state.table_errors)
            .insert((schema.into(), table.into()), message.into());
        self
    }

    pub fn set_schemas(&self, names: Vec<String>) {
        *write(&self.state.schemas) = names;
    }

    pub fn set_schema_objects(&self, schema: impl Into<String>, contents: SchemaContents) {
        let schema = schema.into();

        {
            let mut schemas = write(&self.state.schemas);
            if !schemas.contains(&schema) {
                schemas.push(schema.clone());
            }
        }

        write(&self.state.schema_objects).insert(schema, contents);
    }

    pub fn set_table_detail(
        &self,
        schema: impl Into<String>,
        table: impl Into<String>,
        detail: TableDetail,
    ) {
        write(&self.state.table_details).insert((schema.into(), table.into()), detail);
    }

    pub fn set_list_error(&self, message: impl Into<String>) {
        *write(&self.state.list_error) = Some(message.into());
    }

    pub fn set_schema_error(&self, schema: impl Into<String>, message: impl Into<String>) {
        write(&self.state.schema_errors).insert(schema.into(), message.into());
    }

    pub fn clear_schema_error(&self, schema: &str) {
        write(&self.state.schema_errors).remove(schema);
    }

    pub fn clear_table_error(&self, schema: &str, table: &str) {
        write(&self.state.table_errors).remove(&(schema.to_string(), table.to_string()));
    }

    pub fn stats(&self) -> FakeFetcherStats {
        FakeFetcherStats {
            list_calls: self.state.list_calls.load(Ordering::Relaxed),
            schema_calls: recorded(&self.state.schema_calls),
            table_calls: recorded(&self.state.table_calls),
        }
    }

    pub fn as_fetcher_arc(self) -> Arc<dyn MetadataFetcher> {
        Arc::new(self)
    }
}

#[async_trait]
impl MetadataFetcher for FakeFetcher {
    async fn list_schemas(&self) -> Result<Vec<String>, TreeError> {
        self.state.list_calls.fetch_add(1, Ordering::Relaxed);

        if let Some(message) = read(&self.state.list_error).clone() {
            return Err(TreeError::fetch_failed(message));
        }

        Ok(read(&self.state.schemas).clone())
    }

    async fn list_schema_objects(&self, schema: &str) -> Result<SchemaContents, TreeError> {
        record(&self.state.schema_calls, schema.to_string());

        if let Some(message) = read(&self.state.schema_errors).get(schema) {
            return Err(TreeError::fetch_failed(message.clone()));
        }

        read(&self.state.schema_objects)
            .get(schema)
            .cloned()
            .ok_or_else(|| TreeError::fetch_failed(format!("unknown schema {}", schema)))
    }

    async fn get_table_detail(
        &self,
        schema: &str,
        table: &str,
    ) -> Result<TableDetail, TreeError> {
        let key = (schema.to_string(), table.to_string());
        record(&self.state.table_calls, key.clone());

        if let Some(message) = read(&self.state.table_errors).get(&key) {
            return Err(TreeError::fetch_failed(message.clone()));
        }

        read(&self.state.table_details)
            .get(&key)
            .cloned()
            .ok_or_else(|| TreeError::fetch_failed(format!("unknown table {}.{}", schema, table)))
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn record<T>(calls: &Mutex<Vec<T>>, call: T) {
    calls.lock().unwrap_or_else(PoisonError::into_inner).push(call);
}

fn recorded<T: Clone>(calls: &Mutex<Vec<T>>) -> Vec<T> {
    calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
}

#[cfg(test)]
mod tests {
    use super::FakeFetcher;
    use crate::fixtures;
    use dbtree_core::{MetadataFetcher, TreeError};

    #[tokio::test]
    async fn answers_and_records_calls() {
        let fetcher = FakeFetcher::new()
            .with_schema_objects("public", fixtures::contents(&["users", "orders"]))
            .with_table_detail("public", "users", fixtures::users_detail());

        assert_eq!(fetcher.list_schemas().await.unwrap(), vec!["public"]);
        assert_eq!(
            fetcher.list_schema_objects("public").await.unwrap().tables,
            vec!["users", "orders"]
        );
        assert_eq!(
            fetcher
                .get_table_detail("public", "users")
                .await
                .unwrap()
                .columns
                .len(),
            3
        );

        let stats = fetcher.stats();
        assert_eq!(stats.list_calls, 1);
        assert_eq!(stats.schema_call_count("public"), 1);
        assert_eq!(stats.table_call_count("public", "users"), 1);
        assert_eq!(stats.total_calls(), 3);
    }

    #[tokio::test]
    async fn scripted_errors_can_be_cleared() {
        let fetcher = FakeFetcher::new()
            .with_schema_objects("x", fixtures::contents(&["t"]))
            .with_schema_error("x", "connection reset");

        let observer = fetcher.clone();

        assert!(matches!(
            fetcher.list_schema_objects("x").await,
            Err(TreeError::FetchFailed(_))
        ));

        observer.clear_schema_error("x");
        assert!(fetcher.list_schema_objects("x").await.is_ok());
        assert_eq!(observer.stats().schema_call_count("x"), 2);
    }

    #[tokio::test]
    async fn unknown_names_fail() {
        let fetcher = FakeFetcher::new();

        assert!(fetcher.list_schema_objects("missing").await.is_err());
        assert!(fetcher.get_table_detail("a", "b").await.is_err());
    }
}
