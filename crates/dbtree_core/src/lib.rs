mod cache;
mod config;
mod error;
mod events;
mod fetch;
mod fetcher;
mod filter;
mod forest;
mod inflight;
mod metadata;
mod node;
mod node_id;
mod panel;
pub mod payload;
mod store;
mod tree_builder;

pub use cache::{MetadataCache, TableKey};
pub use config::{ExpandAllMode, TreeConfig, TreeConfigStore};
pub use error::TreeError;
pub use events::TreeEvent;
pub use fetch::{FetchOutcome, FetchRequest, FetchedData};
pub use fetcher::MetadataFetcher;
pub use filter::{collect_ids, filter_forest, name_matches, normalize_query};
pub use inflight::{FetchKey, FetchTracker, InFlightSnapshot};
pub use metadata::{
    ColumnInfo, FunctionInfo, IndexInfo, IndexType, ProcedureInfo, SchemaContents, TableDetail,
    TriggerInfo, ViewInfo, validate_identifier, validate_schema_names,
};
pub use node::{LoadState, NodeKind, NodeMetadata, TreeNode, find_in_forest};
pub use node_id::{FolderKind, NODE_ID_SEPARATOR, NodeId, ParseNodeIdError};
pub use panel::{DetailPanelState, DetailTab, SelectedTable};
pub use payload::{JsonFetcher, JsonMetadataSource};
pub use store::{FetchFailure, SchemaTreeStore, VisibleRow};
pub use tree_builder::{column_nodes, schema_children};
