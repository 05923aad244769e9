use async_trait::async_trait;

use crate::{SchemaContents, TableDetail, TreeError};

/// Source of database metadata for the schema tree.
///
/// Implemented by the host application on top of its connection layer. Every
/// call may fail; failures are returned as `Err`, never panicked, so the store
/// can revert the node that asked for the data.
#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    /// Names of all schemas visible to the connection, in display order.
    async fn list_schemas(&self) -> Result<Vec<String>, TreeError>;

    /// Tables, views, procedures, functions and triggers of one schema.
    async fn list_schema_objects(&self, schema: &str) -> Result<SchemaContents, TreeError>;

    /// Columns and indexes of one table.
    async fn get_table_detail(&self, schema: &str, table: &str)
    -> Result<TableDetail, TreeError>;
}
