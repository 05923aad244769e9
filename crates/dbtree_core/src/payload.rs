//! Parsing of raw JSON metadata responses.
//!
//! Backends that answer with loosely shaped JSON go through here before
//! anything reaches the store. A response that does not match the fixed
//! contract is a [`TreeError::MalformedPayload`], which the store handles the
//! same way as a failed fetch.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    MetadataFetcher, SchemaContents, TableDetail, TreeError, metadata::validate_schema_names,
};

pub fn parse_schema_list(value: Value) -> Result<Vec<String>, TreeError> {
    let names: Vec<String> = decode("schema list", value)?;
    validate_schema_names(&names)?;
    Ok(names)
}

pub fn parse_schema_contents(value: Value) -> Result<SchemaContents, TreeError> {
    let contents: SchemaContents = decode("schema contents", value)?;
    contents.validate()?;
    Ok(contents)
}

pub fn parse_table_detail(value: Value) -> Result<TableDetail, TreeError> {
    let detail: TableDetail = decode("table detail", value)?;
    detail.validate()?;
    Ok(detail)
}

fn decode<T: DeserializeOwned>(what: &str, value: Value) -> Result<T, TreeError> {
    serde_json::from_value(value).map_err(|e| {
        log::warn!("Rejected {} payload: {}", what, e);
        TreeError::malformed(format!("{}: {}", what, e))
    })
}

/// Backend that answers metadata requests with untyped JSON.
#[async_trait]
pub trait JsonMetadataSource: Send + Sync {
    async fn schemas(&self) -> Result<Value, TreeError>;

    async fn schema_objects(&self, schema: &str) -> Result<Value, TreeError>;

    async fn table_detail(&self, schema: &str, table: &str) -> Result<Value, TreeError>;
}

/// Adapts a [`JsonMetadataSource`] into a typed [`MetadataFetcher`].
pub struct JsonFetcher<S> {
    source: S,
}

impl<S: JsonMetadataSource> JsonFetcher<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

#[async_trait]
impl<S: JsonMetadataSource> MetadataFetcher for JsonFetcher<S> {
    async fn list_schemas(&self) -> Result<Vec<String>, TreeError> {
        parse_schema_list(self.source.schemas().await?)
    }

    async fn list_schema_objects(&self, schema: &str) -> Result<SchemaContents, TreeError> {
        parse_schema_contents(self.source.schema_objects(schema).await?)
    }

    async fn get_table_detail(
        &self,
        schema: &str,
        table: &str,
    ) -> Result<TableDetail, TreeError> {
        parse_table_detail(self.source.table_detail(schema, table).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IndexType;
    use serde_json::json;

    #[test]
    fn parses_backend_schema_contents() {
        let value = json!({
            "tables": ["customers", "department"],
            "views": [{
                "view_name": "employee_summary",
                "view_definition": "SELECT e.id FROM employee e"
            }],
            "procedures": [{
                "procedure_name": "process_order",
                "procedure_definition": "CREATE PROCEDURE process_order ..."
            }],
            "functions": [{
                "function_name": "calculate_total_sales",
                "function_definition": "CREATE FUNCTION calculate_total_sales ...",
                "function_return": "DECIMAL"
            }],
            "triggers": [{
                "trigger_name": "log_order_changes",
                "trigger_definition": "CREATE TRIGGER log_order_changes ...",
                "table_name": "orders"
            }]
        });

        let contents = parse_schema_contents(value).unwrap();
        assert_eq!(contents.tables, vec!["customers", "department"]);
        assert_eq!(contents.views[0].name, "employee_summary");
        assert_eq!(contents.functions[0].return_type, "DECIMAL");
        assert_eq!(contents.triggers[0].table, "orders");
    }

    #[test]
    fn missing_list_is_malformed() {
        let value = json!({ "tables": ["users"] });

        assert!(matches!(
            parse_schema_contents(value),
            Err(TreeError::MalformedPayload(_))
        ));
    }

    #[test]
    fn wrong_type_is_malformed() {
        let value = json!({
            "tables": "users",
            "views": [],
            "procedures": [],
            "functions": [],
            "triggers": []
        });

        assert!(parse_schema_contents(value).is_err());
    }

    #[test]
    fn parses_backend_table_detail() {
        let value = json!({
            "columns": [
                { "column_name": "id", "data_type": "int", "nullable": false, "is_primary_key": true },
                { "column_name": "status", "data_type": "varchar(20)", "nullable": false, "default_value": "pending" }
            ],
            "indexes": [
                { "index_name": "pk_orders", "index_type": "PRIMARY", "columns": ["id"], "is_unique": true }
            ]
        });

        let detail = parse_table_detail(value).unwrap();
        assert_eq!(detail.columns.len(), 2);
        assert!(detail.columns[0].is_primary_key);
        assert!(!detail.columns[1].is_foreign_key);
        assert_eq!(detail.columns[1].default_value.as_deref(), Some("pending"));
        assert_eq!(detail.indexes[0].index_type, IndexType::Primary);
    }

    #[test]
    fn unknown_index_type_is_malformed() {
        let value = json!({
            "columns": [],
            "indexes": [
                { "index_name": "ix", "index_type": "SPATIAL", "columns": ["geom"], "is_unique": false }
            ]
        });

        assert!(parse_table_detail(value).is_err());
    }

    #[test]
    fn schema_list_must_be_strings() {
        assert_eq!(
            parse_schema_list(json!(["deptdb", "empdb", "public"])).unwrap(),
            vec!["deptdb", "empdb", "public"]
        );
        assert!(parse_schema_list(json!([1, 2])).is_err());
        assert!(parse_schema_list(json!(["a", "a"])).is_err());
    }

    struct CannedSource;

    #[async_trait]
    impl JsonMetadataSource for CannedSource {
        async fn schemas(&self) -> Result<Value, TreeError> {
            Ok(json!(["public"]))
        }

        async fn schema_objects(&self, _schema: &str) -> Result<Value, TreeError> {
            Ok(json!({ "tables": ["users"] }))
        }

        async fn table_detail(&self, _schema: &str, _table: &str) -> Result<Value, TreeError> {
            Err(TreeError::fetch_failed("connection reset"))
        }
    }

    #[tokio::test]
    async fn json_fetcher_parses_and_rejects() {
        let fetcher = JsonFetcher::new(CannedSource);

        assert_eq!(fetcher.list_schemas().await.unwrap(), vec!["public"]);
        assert!(matches!(
            fetcher.list_schema_objects("public").await,
            Err(TreeError::MalformedPayload(_))
        ));
        assert!(matches!(
            fetcher.get_table_detail("public", "users").await,
            Err(TreeError::FetchFailed(_))
        ));
    }
}
