use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{NODE_ID_SEPARATOR, TreeError};

/// Objects of one schema, as returned by the metadata fetcher.
///
/// Field aliases accept the backend's wire names, so raw JSON responses can
/// be deserialized directly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaContents {
    pub tables: Vec<String>,
    pub views: Vec<ViewInfo>,
    pub procedures: Vec<ProcedureInfo>,
    pub functions: Vec<FunctionInfo>,
    pub triggers: Vec<TriggerInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewInfo {
    #[serde(alias = "view_name")]
    pub name: String,

    #[serde(alias = "view_definition")]
    pub definition: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcedureInfo {
    #[serde(alias = "procedure_name")]
    pub name: String,

    #[serde(alias = "procedure_definition")]
    pub definition: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionInfo {
    #[serde(alias = "function_name")]
    pub name: String,

    #[serde(alias = "function_definition")]
    pub definition: String,

    #[serde(alias = "function_return")]
    pub return_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerInfo {
    #[serde(alias = "trigger_name")]
    pub name: String,

    #[serde(alias = "trigger_definition")]
    pub definition: String,

    /// Table the trigger is attached to.
    #[serde(alias = "table_name")]
    pub table: String,
}

/// Columns and indexes of one table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDetail {
    pub columns: Vec<ColumnInfo>,
    pub indexes: Vec<IndexInfo>,
}

/// Column metadata within a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    #[serde(alias = "column_name")]
    pub name: String,

    /// Database-specific type (e.g., "int", "varchar(25)").
    #[serde(alias = "type_name")]
    pub data_type: String,

    pub nullable: bool,

    #[serde(default)]
    pub is_primary_key: bool,

    #[serde(default)]
    pub is_foreign_key: bool,

    /// Default value expression, if any.
    #[serde(default)]
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexType {
    #[serde(rename = "PRIMARY", alias = "primary")]
    Primary,
    #[serde(rename = "UNIQUE", alias = "unique")]
    Unique,
    #[serde(rename = "INDEX", alias = "index")]
    Index,
    #[serde(rename = "FOREIGN", alias = "foreign")]
    Foreign,
}

/// Index metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexInfo {
    #[serde(alias = "index_name")]
    pub name: String,

    #[serde(rename = "type", alias = "index_type")]
    pub index_type: IndexType,

    /// Column names included in the index.
    pub columns: Vec<String>,

    pub is_unique: bool,
}

impl SchemaContents {
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
            && self.views.is_empty()
            && self.procedures.is_empty()
            && self.functions.is_empty()
            && self.triggers.is_empty()
    }

    /// Rejects contents that cannot be turned into uniquely identified nodes.
    pub fn validate(&self) -> Result<(), TreeError> {
        check_unique_names("table", self.tables.iter().map(String::as_str))?;
        check_unique_names("view", self.views.iter().map(|v| v.name.as_str()))?;
        check_unique_names(
            "procedure",
            self.procedures.iter().map(|p| p.name.as_str()),
        )?;
        check_unique_names("function", self.functions.iter().map(|f| f.name.as_str()))?;

        let mut seen = HashSet::new();
        for trigger in &self.triggers {
            validate_identifier("trigger", &trigger.name)?;
            validate_identifier("trigger table", &trigger.table)?;

            if !seen.insert((trigger.table.as_str(), trigger.name.as_str())) {
                return Err(TreeError::malformed(format!(
                    "duplicate trigger {:?} on table {:?}",
                    trigger.name, trigger.table
                )));
            }
        }

        Ok(())
    }
}

impl TableDetail {
    pub fn validate(&self) -> Result<(), TreeError> {
        check_unique_names("column", self.columns.iter().map(|c| c.name.as_str()))?;

        let mut seen = HashSet::new();
        for index in &self.indexes {
            if index.name.trim().is_empty() {
                return Err(TreeError::malformed("index with empty name"));
            }

            if !seen.insert(index.name.as_str()) {
                return Err(TreeError::malformed(format!(
                    "duplicate index name {:?}",
                    index.name
                )));
            }

            if index.columns.is_empty() {
                return Err(TreeError::malformed(format!(
                    "index {:?} covers no columns",
                    index.name
                )));
            }
        }

        Ok(())
    }
}

/// Validates the schema names returned by `list_schemas`.
pub fn validate_schema_names(names: &[String]) -> Result<(), TreeError> {
    check_unique_names("schema", names.iter().map(String::as_str))
}

/// Checks that a name can be embedded in a node id.
pub fn validate_identifier(what: &str, name: &str) -> Result<(), TreeError> {
    if name.trim().is_empty() {
        return Err(TreeError::malformed(format!("{} with empty name", what)));
    }

    if name.contains(NODE_ID_SEPARATOR) {
        return Err(TreeError::malformed(format!(
            "{} name {:?} contains reserved character {:?}",
            what, name, NODE_ID_SEPARATOR
        )));
    }

    Ok(())
}

fn check_unique_names<'a>(
    what: &str,
    names: impl IntoIterator<Item = &'a str>,
) -> Result<(), TreeError> {
    let mut seen = HashSet::new();

    for name in names {
        validate_identifier(what, name)?;

        if !seen.insert(name) {
            return Err(TreeError::malformed(format!(
                "duplicate {} name {:?}",
                what, name
            )));
        }
    }

    Ok(())
}
