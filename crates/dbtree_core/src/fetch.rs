use crate::{FetchKey, MetadataFetcher, SchemaContents, TableDetail, TreeError};

/// A fetch the store has decided to issue.
///
/// Produced by the synchronous store operations, executed by the host outside
/// any borrow of the store, and handed back through
/// [`SchemaTreeStore::apply_fetch`](crate::SchemaTreeStore::apply_fetch).
/// A request that will never be applied must be handed to
/// [`SchemaTreeStore::abandon_fetch`](crate::SchemaTreeStore::abandon_fetch),
/// otherwise its node stays loading.
///
/// Requests cannot be cloned, so one key is fetched at most once per request:
///
/// ```compile_fail
/// fn duplicate<T: Clone>() {}
/// duplicate::<dbtree_core::FetchRequest>();
/// ```
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a fetch request does nothing until executed and applied"]
pub struct FetchRequest {
    key: FetchKey,
}

impl FetchRequest {
    pub(crate) fn new(key: FetchKey) -> Self {
        Self { key }
    }

    pub fn key(&self) -> &FetchKey {
        &self.key
    }

    /// Calls the fetcher. This is the only point where the tree waits.
    pub async fn execute(self, fetcher: &dyn MetadataFetcher) -> FetchOutcome {
        let result = match &self.key {
            FetchKey::SchemaList => fetcher.list_schemas().await.map(FetchedData::Schemas),
            FetchKey::SchemaObjects { schema } => fetcher
                .list_schema_objects(schema)
                .await
                .map(FetchedData::SchemaObjects),
            FetchKey::TableDetail(table) => fetcher
                .get_table_detail(&table.schema, &table.table)
                .await
                .map(FetchedData::TableDetail),
        };

        FetchOutcome {
            key: self.key,
            result,
        }
    }
}

/// Data returned by a completed fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchedData {
    Schemas(Vec<String>),
    SchemaObjects(SchemaContents),
    TableDetail(TableDetail),
}

/// Result of executing a [`FetchRequest`].
#[derive(Debug)]
pub struct FetchOutcome {
    pub key: FetchKey,
    pub result: Result<FetchedData, TreeError>,
}

impl FetchOutcome {
    pub fn success(key: FetchKey, data: FetchedData) -> Self {
        Self {
            key,
            result: Ok(data),
        }
    }

    pub fn failure(key: FetchKey, error: TreeError) -> Self {
        Self {
            key,
            result: Err(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}
