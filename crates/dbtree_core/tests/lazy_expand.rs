use std::sync::Arc;

use async_trait::async_trait;
use dbtree_core::{
    ExpandAllMode, FetchKey, FolderKind, JsonFetcher, JsonMetadataSource, LoadState,
    MetadataFetcher, NodeId, NodeKind, SchemaContents, SchemaTreeStore, TableDetail, TreeConfig,
    TreeError, TreeEvent, TreeNode,
};
use futures::FutureExt;
use dbtree_test_support::{FakeFetcher, fixtures};
use serde_json::{Value, json};

fn store_for(fetcher: &FakeFetcher) -> SchemaTreeStore {
    SchemaTreeStore::new(fetcher.clone().as_fetcher_arc())
}

fn child_names(node: &TreeNode) -> Vec<&str> {
    node.children().iter().map(|c| c.name.as_str()).collect()
}

#[tokio::test]
async fn expanding_public_builds_tables_folder_once() {
    let fetcher =
        FakeFetcher::new().with_schema_objects("public", fixtures::contents(&["users", "orders"]));
    let mut store = store_for(&fetcher);
    store.load_schemas().await.unwrap();

    let public = NodeId::schema("public");
    let root = store.node(&public).unwrap();
    assert_eq!(root.load_state, LoadState::Unloaded);
    assert!(root.has_children);

    store.toggle_node(&public).await.unwrap();

    assert_eq!(fetcher.stats().schema_calls, vec!["public"]);

    let root = store.node(&public).unwrap();
    assert_eq!(root.load_state, LoadState::Loaded);
    assert_eq!(child_names(&root), vec!["Tables"]);

    let folder = &root.children()[0];
    assert_eq!(folder.kind, NodeKind::Folder);
    assert_eq!(folder.id, NodeId::folder("public", FolderKind::Tables));
    assert_eq!(child_names(folder), vec!["users", "orders"]);
    assert!(folder.children().iter().all(|t| !t.has_children && t.is_loaded()));

    store.toggle_node(&public).await.unwrap();
    assert!(!store.is_expanded(&public));
    store.toggle_node(&public).await.unwrap();
    assert!(store.is_expanded(&public));

    assert_eq!(fetcher.stats().schema_call_count("public"), 1);
}

#[tokio::test]
async fn double_toggle_while_loading_issues_one_fetch() {
    let fetcher = FakeFetcher::new().with_schema_objects("public", fixtures::contents(&["users"]));
    let mut store = store_for(&fetcher);
    store.set_schemas(vec!["public".into()]).unwrap();
    let public = NodeId::schema("public");

    let first = store.toggle(&public).unwrap();
    let second = store.toggle(&public).unwrap();

    assert!(second.is_none());
    assert!(store.is_expanded(&public));
    assert_eq!(store.load_state(&public), Some(LoadState::Loading));

    let outcome = first.unwrap().execute(&fetcher).await;
    store.apply_fetch(outcome).unwrap();

    assert_eq!(fetcher.stats().schema_call_count("public"), 1);
    assert_eq!(store.load_state(&public), Some(LoadState::Loaded));
}

#[tokio::test]
async fn collapse_then_expand_keeps_children_without_fetching() {
    let fetcher = FakeFetcher::new().with_schema_objects("deptdb", fixtures::deptdb_contents());
    let mut store = store_for(&fetcher);
    store.load_schemas().await.unwrap();
    let deptdb = NodeId::schema("deptdb");

    store.toggle_node(&deptdb).await.unwrap();
    let before = store.node(&deptdb).unwrap();

    store.collapse_all();
    assert!(store.expanded_ids().is_empty());

    assert!(store.toggle(&deptdb).unwrap().is_none());
    assert_eq!(store.node(&deptdb).unwrap(), before);
    assert_eq!(fetcher.stats().schema_call_count("deptdb"), 1);
}

#[tokio::test]
async fn all_folders_appear_in_fixed_order() {
    let fetcher = FakeFetcher::new().with_schema_objects("deptdb", fixtures::deptdb_contents());
    let mut store = store_for(&fetcher);
    store.load_schemas().await.unwrap();
    let deptdb = NodeId::schema("deptdb");

    store.toggle_node(&deptdb).await.unwrap();

    let root = store.node(&deptdb).unwrap();
    assert_eq!(
        child_names(&root),
        vec!["Tables", "Views", "Stored Procedures", "Functions", "Triggers"]
    );

    let trigger = store
        .node(&NodeId::trigger("deptdb", "employee", "update_employee_modified"))
        .unwrap();
    assert_eq!(trigger.metadata.table_name.as_deref(), Some("employee"));
    assert!(trigger.metadata.definition.is_some());
}

#[tokio::test]
async fn failed_fetch_reverts_and_retry_fetches_again() {
    let fetcher = FakeFetcher::new()
        .with_schema_objects("X", fixtures::contents(&["t"]))
        .with_schema_error("X", "connection reset");
    let mut store = store_for(&fetcher);
    store.load_schemas().await.unwrap();
    let mut events = store.subscribe();
    let x = NodeId::schema("X");

    let result = store.toggle_node(&x).await;

    assert!(matches!(result, Err(TreeError::FetchFailed(_))));
    assert_eq!(store.load_state(&x), Some(LoadState::Unloaded));
    assert!(!store.is_expanded(&x));
    assert!(store.in_flight().is_empty());
    assert_eq!(
        store.last_error().map(|e| e.key.clone()),
        Some(FetchKey::schema_objects("X"))
    );
    assert!(matches!(
        events.try_recv().unwrap(),
        TreeEvent::FetchFailed { key: FetchKey::SchemaObjects { .. }, .. }
    ));

    fetcher.clear_schema_error("X");
    store.toggle_node(&x).await.unwrap();

    assert_eq!(store.load_state(&x), Some(LoadState::Loaded));
    assert_eq!(fetcher.stats().schema_call_count("X"), 2);
    assert!(store.take_error().is_some());
    assert!(store.last_error().is_none());
}

#[tokio::test]
async fn abandoned_request_lets_the_node_retry() {
    let fetcher = FakeFetcher::new().with_schema_objects("public", fixtures::contents(&["users"]));
    let mut store = store_for(&fetcher);
    store.set_schemas(vec!["public".into()]).unwrap();
    let public = NodeId::schema("public");

    let lost = store.toggle(&public).unwrap().unwrap();
    let key = lost.key().clone();
    drop(lost);

    store.abandon_fetch(&key);

    assert_eq!(store.load_state(&public), Some(LoadState::Unloaded));
    assert!(!store.is_expanded(&public));
    assert!(store.in_flight().is_empty());

    let retry = store.toggle(&public).unwrap().unwrap();
    let outcome = retry.execute(&fetcher).await;
    store.apply_fetch(outcome).unwrap();

    assert_eq!(store.load_state(&public), Some(LoadState::Loaded));
    assert_eq!(fetcher.stats().schema_call_count("public"), 1);
}

#[tokio::test]
async fn clearing_the_loading_flag_releases_the_fetch_key() {
    let fetcher = FakeFetcher::new().with_schema_objects("public", fixtures::contents(&["users"]));
    let mut store = store_for(&fetcher);
    store.set_schemas(vec!["public".into()]).unwrap();
    let public = NodeId::schema("public");

    drop(store.toggle(&public).unwrap());
    store.set_node_loading(&public, false).unwrap();
    store.collapse_all();

    assert!(store.in_flight().is_empty());

    let retry = store.toggle(&public).unwrap();
    assert!(retry.is_some());
    assert_eq!(store.load_state(&public), Some(LoadState::Loading));
    assert_eq!(store.in_flight().len(), 1);

    let outcome = retry.unwrap().execute(&fetcher).await;
    store.apply_fetch(outcome).unwrap();
    assert_eq!(store.load_state(&public), Some(LoadState::Loaded));
}

/// A backend that never answers.
struct Stalled;

#[async_trait]
impl MetadataFetcher for Stalled {
    async fn list_schemas(&self) -> Result<Vec<String>, TreeError> {
        std::future::pending().await
    }

    async fn list_schema_objects(&self, _schema: &str) -> Result<SchemaContents, TreeError> {
        std::future::pending().await
    }

    async fn get_table_detail(
        &self,
        _schema: &str,
        _table: &str,
    ) -> Result<TableDetail, TreeError> {
        std::future::pending().await
    }
}

#[test]
fn cancelled_toggle_reverts_the_node() {
    let mut store = SchemaTreeStore::new(Arc::new(Stalled));
    store.set_schemas(vec!["public".into()]).unwrap();
    let public = NodeId::schema("public");

    assert!(store.toggle_node(&public).now_or_never().is_none());

    assert_eq!(store.load_state(&public), Some(LoadState::Unloaded));
    assert!(!store.is_expanded(&public));
    assert!(store.in_flight().is_empty());

    let retry = store.toggle(&public).unwrap();
    assert!(retry.is_some());
}

#[tokio::test]
async fn completions_apply_in_arrival_order() {
    let fetcher = FakeFetcher::new()
        .with_schema_objects("a", fixtures::contents(&["a1"]))
        .with_schema_objects("b", fixtures::contents(&["b1"]));
    let mut store = store_for(&fetcher);
    store.load_schemas().await.unwrap();
    let a = NodeId::schema("a");
    let b = NodeId::schema("b");

    let request_a = store.toggle(&a).unwrap().unwrap();
    let request_b = store.toggle(&b).unwrap().unwrap();
    assert_eq!(store.in_flight().len(), 2);

    let outcome_b = request_b.execute(&fetcher).await;
    store.apply_fetch(outcome_b).unwrap();

    assert_eq!(store.load_state(&a), Some(LoadState::Loading));
    assert_eq!(store.load_state(&b), Some(LoadState::Loaded));

    let outcome_a = request_a.execute(&fetcher).await;
    store.apply_fetch(outcome_a).unwrap();

    assert_eq!(store.load_state(&a), Some(LoadState::Loaded));
    assert!(store.node(&NodeId::table("a", "a1")).is_some());
    assert!(store.node(&NodeId::table("b", "b1")).is_some());
}

#[tokio::test]
async fn collapse_during_fetch_still_loads_the_node() {
    let fetcher = FakeFetcher::new().with_schema_objects("public", fixtures::contents(&["users"]));
    let mut store = store_for(&fetcher);
    store.load_schemas().await.unwrap();
    let public = NodeId::schema("public");

    let request = store.toggle(&public).unwrap().unwrap();
    store.collapse_node_and_children(&public);

    let outcome = request.execute(&fetcher).await;
    store.apply_fetch(outcome).unwrap();

    assert_eq!(store.load_state(&public), Some(LoadState::Loaded));
    assert!(!store.is_expanded(&public));

    assert!(store.toggle(&public).unwrap().is_none());
    assert!(store.is_expanded(&public));
    assert_eq!(fetcher.stats().schema_call_count("public"), 1);
}

#[tokio::test]
async fn completion_for_removed_schema_only_fills_cache() {
    let fetcher = FakeFetcher::new()
        .with_schema_objects("a", fixtures::contents(&["t"]))
        .with_schema_objects("b", fixtures::contents(&["u"]));
    let mut store = store_for(&fetcher);
    store.load_schemas().await.unwrap();
    let a = NodeId::schema("a");

    let request = store.toggle(&a).unwrap().unwrap();
    store.set_schemas(vec!["b".into()]).unwrap();

    let outcome = request.execute(&fetcher).await;
    store.apply_fetch(outcome).unwrap();

    assert!(store.node(&a).is_none());
    assert!(store.cache().has_schema("a"));

    store.set_schemas(vec!["a".into(), "b".into()]).unwrap();
    assert!(store.toggle(&a).unwrap().is_none());
    assert_eq!(store.load_state(&a), Some(LoadState::Loaded));
    assert_eq!(fetcher.stats().schema_call_count("a"), 1);
}

#[tokio::test]
async fn refresh_keeps_loaded_schemas_and_drops_vanished_ones() {
    let fetcher = FakeFetcher::new()
        .with_schema_objects("public", fixtures::contents(&["users"]))
        .with_schema_objects("old", fixtures::contents(&["legacy"]));
    let mut store = store_for(&fetcher);
    store.load_schemas().await.unwrap();

    let public = NodeId::schema("public");
    let old = NodeId::schema("old");
    store.toggle_node(&public).await.unwrap();
    store.toggle_node(&old).await.unwrap();

    fetcher.set_schemas(vec!["new".into(), "public".into()]);
    store.load_schemas().await.unwrap();

    let roots: Vec<String> = store.full_tree().into_iter().map(|n| n.name).collect();
    assert_eq!(roots, vec!["new", "public"]);
    assert_eq!(store.load_state(&public), Some(LoadState::Loaded));
    assert!(store.is_expanded(&public));
    assert!(store.node(&NodeId::table("old", "legacy")).is_none());
    assert!(!store.is_expanded(&old));
    assert!(store.cache().has_schema("old"));
    assert_eq!(
        store.load_state(&NodeId::schema("new")),
        Some(LoadState::Unloaded)
    );
}

#[tokio::test]
async fn failed_schema_list_leaves_forest_untouched() {
    let fetcher = FakeFetcher::new().with_schemas(["public", "empdb"]);
    let mut store = store_for(&fetcher);
    store.load_schemas().await.unwrap();
    let before = store.full_tree();

    fetcher.set_list_error("timeout");
    let result = store.load_schemas().await;

    assert!(result.is_err());
    assert_eq!(store.full_tree(), before);
    assert_eq!(
        store.last_error().map(|e| e.key.clone()),
        Some(FetchKey::SchemaList)
    );
}

#[tokio::test]
async fn expand_all_marks_without_loading_by_default() {
    let fetcher = FakeFetcher::new()
        .with_schema_objects("a", fixtures::contents(&["t"]))
        .with_schema_objects("b", fixtures::contents(&["u"]));
    let mut store = store_for(&fetcher);
    store.load_schemas().await.unwrap();

    let requests = store.expand_all();

    assert!(requests.is_empty());
    assert!(store.is_expanded(&NodeId::schema("a")));
    assert!(store.is_expanded(&NodeId::schema("b")));
    assert_eq!(
        store.load_state(&NodeId::schema("a")),
        Some(LoadState::Unloaded)
    );
    assert!(fetcher.stats().schema_calls.is_empty());
}

#[tokio::test]
async fn cascade_expand_all_loads_one_level() {
    let fetcher = FakeFetcher::new()
        .with_schema_objects("a", fixtures::contents(&["t"]))
        .with_schema_objects("b", fixtures::contents(&["u"]));
    let config = TreeConfig {
        expand_all: ExpandAllMode::CascadeLoad,
        ..TreeConfig::default()
    };
    let mut store = SchemaTreeStore::with_config(fetcher.clone().as_fetcher_arc(), config);
    store.load_schemas().await.unwrap();

    store.expand_all_and_load().await.unwrap();

    for schema in ["a", "b"] {
        let id = NodeId::schema(schema);
        assert_eq!(store.load_state(&id), Some(LoadState::Loaded));
        assert!(store.is_expanded(&id));
        assert!(!store.is_expanded(&NodeId::folder(schema, FolderKind::Tables)));
        assert_eq!(fetcher.stats().schema_call_count(schema), 1);
    }

    store.expand_all_and_load().await.unwrap();
    assert!(store.is_expanded(&NodeId::folder("a", FolderKind::Tables)));
    assert_eq!(fetcher.stats().schema_calls.len(), 2);
}

#[tokio::test]
async fn tables_load_columns_when_enabled() {
    let fetcher = FakeFetcher::new()
        .with_schema_objects("public", fixtures::contents(&["users"]))
        .with_table_detail("public", "users", fixtures::users_detail());
    let config = TreeConfig {
        table_columns_in_tree: true,
        ..TreeConfig::default()
    };
    let mut store = SchemaTreeStore::with_config(fetcher.clone().as_fetcher_arc(), config);
    store.load_schemas().await.unwrap();

    store.toggle_node(&NodeId::schema("public")).await.unwrap();
    let users = NodeId::table("public", "users");
    assert_eq!(store.load_state(&users), Some(LoadState::Unloaded));

    store.toggle_node(&users).await.unwrap();

    let table = store.node(&users).unwrap();
    assert_eq!(child_names(&table), vec!["id", "email", "created_at"]);
    assert!(table.children()[0].metadata.is_primary_key);

    store.select_node(&users).await.unwrap();
    assert!(store.panel().is_open());
    assert_eq!(fetcher.stats().table_call_count("public", "users"), 1);
}

#[test]
fn host_folder_without_loader_expands_empty() {
    let fetcher = FakeFetcher::new();
    let mut store = store_for(&fetcher);
    let folder = NodeId::folder("public", FolderKind::Views);
    store
        .set_tree_data(vec![TreeNode::new(folder.clone(), "Views", true)])
        .unwrap();

    assert!(store.toggle(&folder).unwrap().is_none());

    assert!(store.is_expanded(&folder));
    assert_eq!(store.load_state(&folder), Some(LoadState::Unloaded));
    assert_eq!(fetcher.stats().total_calls(), 0);
}

#[test]
fn replace_children_refuses_leaves() {
    let fetcher = FakeFetcher::new();
    let mut store = store_for(&fetcher);
    let leaf = NodeId::table("public", "users");
    store
        .set_tree_data(vec![TreeNode::leaf(leaf.clone(), "users")])
        .unwrap();

    let result = store.replace_children(
        &leaf,
        vec![TreeNode::leaf(NodeId::column("public", "users", "id"), "id")],
    );

    assert!(matches!(result, Err(TreeError::NotExpandable(_))));
    assert!(store.node(&leaf).unwrap().children().is_empty());
}

struct LooseBackend;

#[async_trait]
impl JsonMetadataSource for LooseBackend {
    async fn schemas(&self) -> Result<Value, TreeError> {
        Ok(json!(["deptdb", "broken"]))
    }

    async fn schema_objects(&self, schema: &str) -> Result<Value, TreeError> {
        if schema == "broken" {
            return Ok(json!({ "tables": [{ "name": "users" }] }));
        }

        Ok(json!({
            "tables": ["employee"],
            "views": [{
                "view_name": "employee_summary",
                "view_definition": "SELECT e.id, e.name FROM employee e"
            }],
            "procedures": [],
            "functions": [],
            "triggers": []
        }))
    }

    async fn table_detail(&self, _schema: &str, _table: &str) -> Result<Value, TreeError> {
        Err(TreeError::fetch_failed("not used"))
    }
}

#[tokio::test]
async fn json_backend_payloads_are_checked_at_the_boundary() {
    let mut store = SchemaTreeStore::new(Arc::new(JsonFetcher::new(LooseBackend)));
    store.load_schemas().await.unwrap();

    let deptdb = NodeId::schema("deptdb");
    store.toggle_node(&deptdb).await.unwrap();
    let view = store
        .node(&NodeId::view("deptdb", "employee_summary"))
        .unwrap();
    assert_eq!(
        view.metadata.definition.as_deref(),
        Some("SELECT e.id, e.name FROM employee e")
    );

    let broken = NodeId::schema("broken");
    let result = store.toggle_node(&broken).await;

    assert!(matches!(result, Err(TreeError::MalformedPayload(_))));
    assert_eq!(store.load_state(&broken), Some(LoadState::Unloaded));
    assert!(store.node(&broken).unwrap().children.is_none());
    assert!(!store.cache().has_schema("broken"));
}
