use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::events::EventBus;
use crate::forest::Forest;
use crate::metadata::validate_schema_names;
use crate::tree_builder::{column_nodes, schema_children};
use crate::{
    DetailPanelState, DetailTab, ExpandAllMode, FetchKey, FetchOutcome, FetchRequest,
    FetchTracker, FetchedData, LoadState, MetadataCache, MetadataFetcher, NodeId, NodeKind,
    TableKey, TreeConfig, TreeError, TreeEvent, TreeNode, collect_ids, filter_forest,
    normalize_query,
};

/// The most recent fetch failure, kept until the host takes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub key: FetchKey,
    pub message: String,
}

/// One line of the rendered tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibleRow {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub depth: usize,
    pub expanded: bool,
    pub has_children: bool,
    pub load_state: LoadState,
}

/// Owner of the schema tree: forest, expanded set, search, cache and the
/// detail panel.
///
/// Every fetching operation is split in three steps so that fetches may
/// overlap while the store stays single-owner:
///
/// 1. a synchronous call (`toggle`, `select`, `expand_all`,
///    `begin_load_schemas`) applies the optimistic state and may return a
///    [`FetchRequest`];
/// 2. the host runs [`FetchRequest::execute`] without holding the store;
/// 3. the host hands the [`FetchOutcome`] to [`SchemaTreeStore::apply_fetch`].
///
/// The `async` helpers (`toggle_node`, `select_node`, `load_schemas`,
/// `expand_all_and_load`) chain the three steps with the store's own fetcher.
pub struct SchemaTreeStore {
    fetcher: Arc<dyn MetadataFetcher>,
    config: TreeConfig,
    forest: Forest,
    expanded: HashSet<NodeId>,
    search_query: String,
    filtered: Arc<Vec<TreeNode>>,
    cache: MetadataCache,
    in_flight: FetchTracker,
    panel: DetailPanelState,
    pending_selection: Option<TableKey>,
    last_error: Option<FetchFailure>,
    events: EventBus,
}

impl SchemaTreeStore {
    pub fn new(fetcher: Arc<dyn MetadataFetcher>) -> Self {
        Self::with_config(fetcher, TreeConfig::default())
    }

    pub fn with_config(fetcher: Arc<dyn MetadataFetcher>, config: TreeConfig) -> Self {
        Self {
            fetcher,
            config,
            forest: Forest::default(),
            expanded: HashSet::new(),
            search_query: String::new(),
            filtered: Arc::new(Vec::new()),
            cache: MetadataCache::new(),
            in_flight: FetchTracker::new(),
            panel: DetailPanelState::new(),
            pending_selection: None,
            last_error: None,
            events: EventBus::default(),
        }
    }

    pub fn fetcher(&self) -> Arc<dyn MetadataFetcher> {
        self.fetcher.clone()
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn subscribe(&mut self) -> UnboundedReceiver<TreeEvent> {
        self.events.subscribe()
    }

    // --- Read access ---

    /// The forest as it should be rendered, with the search filter applied.
    ///
    /// Recomputed after every mutation; holding on to it never observes later
    /// changes.
    pub fn snapshot(&self) -> Arc<Vec<TreeNode>> {
        self.filtered.clone()
    }

    /// The unfiltered forest.
    pub fn full_tree(&self) -> Vec<TreeNode> {
        self.forest.snapshot()
    }

    pub fn node(&self, id: &NodeId) -> Option<TreeNode> {
        self.forest.build(id)
    }

    pub fn load_state(&self, id: &NodeId) -> Option<LoadState> {
        self.forest.get(id).map(|slot| slot.load_state)
    }

    pub fn is_expanded(&self, id: &NodeId) -> bool {
        self.expanded.contains(id)
    }

    pub fn expanded_ids(&self) -> &HashSet<NodeId> {
        &self.expanded
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn panel(&self) -> &DetailPanelState {
        &self.panel
    }

    pub fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    pub fn in_flight(&self) -> &FetchTracker {
        &self.in_flight
    }

    /// Table whose detail is being fetched for the panel.
    pub fn pending_selection(&self) -> Option<&TableKey> {
        self.pending_selection.as_ref()
    }

    pub fn last_error(&self) -> Option<&FetchFailure> {
        self.last_error.as_ref()
    }

    pub fn take_error(&mut self) -> Option<FetchFailure> {
        self.last_error.take()
    }

    /// Flattens the filtered forest through the expanded set.
    pub fn visible_rows(&self) -> Vec<VisibleRow> {
        let mut rows = Vec::new();
        for root in self.filtered.iter() {
            self.push_rows(root, 0, &mut rows);
        }
        rows
    }

    fn push_rows(&self, node: &TreeNode, depth: usize, rows: &mut Vec<VisibleRow>) {
        let expanded = self.expanded.contains(&node.id);

        rows.push(VisibleRow {
            id: node.id.clone(),
            name: node.name.clone(),
            kind: node.kind,
            depth,
            expanded,
            has_children: node.has_children,
            load_state: node.load_state,
        });

        if expanded {
            for child in node.children() {
                self.push_rows(child, depth + 1, rows);
            }
        }
    }

    // --- Schema list ---

    /// Starts fetching the schema list, unless it is already being fetched.
    pub fn begin_load_schemas(&mut self) -> Option<FetchRequest> {
        self.begin_fetch(FetchKey::SchemaList)
    }

    pub async fn load_schemas(&mut self) -> Result<(), TreeError> {
        match self.begin_load_schemas() {
            Some(request) => self.run(request).await,
            None => Ok(()),
        }
    }

    /// Rebuilds the roots from a schema list.
    ///
    /// Schemas that are already present keep their loaded branch, new ones
    /// start unloaded and missing ones are dropped. The cache is left as is.
    pub fn set_schemas(&mut self, names: Vec<String>) -> Result<(), TreeError> {
        validate_schema_names(&names)?;
        self.reconcile_schemas(&names);
        self.rebuild();
        Ok(())
    }

    fn reconcile_schemas(&mut self, names: &[String]) {
        self.forest.reconcile_schemas(names);

        let present: HashSet<&str> = names.iter().map(String::as_str).collect();
        self.expanded
            .retain(|id| present.contains(id.schema_name()));

        log::info!("Schema tree has {} schemas", names.len());
    }

    /// Installs a host-built forest.
    pub fn set_tree_data(&mut self, roots: Vec<TreeNode>) -> Result<(), TreeError> {
        self.forest = Forest::from_roots(roots)?;
        self.rebuild();
        Ok(())
    }

    // --- Expansion ---

    /// Toggles a node open or closed.
    ///
    /// Collapsing removes the node and its loaded descendants from the
    /// expanded set. Expanding an unloaded node marks it loading and returns
    /// the fetch to run, unless the cache already has its children. Toggling
    /// a loading node does nothing.
    pub fn toggle(&mut self, id: &NodeId) -> Result<Option<FetchRequest>, TreeError> {
        let slot = self
            .forest
            .get(id)
            .ok_or_else(|| TreeError::NodeNotFound(id.to_string()))?;
        let (load_state, has_children) = (slot.load_state, slot.has_children);

        if load_state == LoadState::Loading {
            log::debug!("Ignoring toggle on {} while it loads", id);
            return Ok(None);
        }

        if self.expanded.contains(id) {
            self.collapse_subtree(id);
            self.rebuild();
            return Ok(None);
        }

        self.expanded.insert(id.clone());

        let request = if has_children && load_state == LoadState::Unloaded {
            self.begin_load(id)?
        } else {
            None
        };

        self.rebuild();
        Ok(request)
    }

    pub async fn toggle_node(&mut self, id: &NodeId) -> Result<(), TreeError> {
        match self.toggle(id)? {
            Some(request) => self.run(request).await,
            None => Ok(()),
        }
    }

    /// Adds `id` to the expanded set without loading anything.
    pub fn expand_node(&mut self, id: &NodeId) {
        if self.expanded.insert(id.clone()) {
            self.rebuild();
        }
    }

    /// Removes `id` from the expanded set, leaving its descendants alone.
    pub fn collapse_node(&mut self, id: &NodeId) {
        if self.expanded.remove(id) {
            self.rebuild();
        }
    }

    /// Removes `id` and every loaded descendant from the expanded set.
    pub fn collapse_node_and_children(&mut self, id: &NodeId) {
        self.collapse_subtree(id);
        self.rebuild();
    }

    /// Expands every ancestor of `id` so that it becomes visible.
    pub fn reveal_node(&mut self, id: &NodeId) -> Result<(), TreeError> {
        if !self.forest.contains(id) {
            return Err(TreeError::NodeNotFound(id.to_string()));
        }

        self.expanded.extend(self.forest.ancestors(id));
        self.rebuild();
        Ok(())
    }

    /// Marks every node present in the forest expanded.
    ///
    /// With [`ExpandAllMode::CascadeLoad`] every unloaded expandable node is
    /// also started loading and the fetches to run are returned. Children
    /// that arrive from those fetches are not expanded.
    pub fn expand_all(&mut self) -> Vec<FetchRequest> {
        let ids = self.forest.all_ids();
        self.expanded.extend(ids.iter().cloned());

        let mut requests = Vec::new();

        if self.config.expand_all == ExpandAllMode::CascadeLoad {
            for id in &ids {
                let pending = self.forest.get(id).is_some_and(|slot| {
                    slot.has_children && slot.load_state == LoadState::Unloaded
                });

                if !pending {
                    continue;
                }

                match self.begin_load(id) {
                    Ok(Some(request)) => requests.push(request),
                    Ok(None) => {}
                    Err(e) => log::warn!("Could not load {} during expand all: {}", id, e),
                }
            }
        }

        self.rebuild();
        requests
    }

    /// Expands everything and runs any cascade fetches concurrently.
    ///
    /// Every outcome is applied; the first failure is returned.
    pub async fn expand_all_and_load(&mut self) -> Result<(), TreeError> {
        let requests = self.expand_all();
        if requests.is_empty() {
            return Ok(());
        }

        let fetcher = self.fetcher.clone();
        let keys = requests.iter().map(|r| r.key().clone()).collect();
        let mut pending = PendingFetches::new(self, keys);

        let outcomes = join_all(
            requests
                .into_iter()
                .map(|request| request.execute(&*fetcher)),
        )
        .await;

        pending.keys.clear();
        let store = &mut *pending.store;

        let mut first_error = None;
        for outcome in outcomes {
            if let Err(e) = store.apply_fetch(outcome)
                && first_error.is_none()
            {
                first_error = Some(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn collapse_all(&mut self) {
        self.expanded.clear();
        self.rebuild();
    }

    /// Replaces the children of a node, marking it loaded.
    pub fn replace_children(
        &mut self,
        id: &NodeId,
        children: Vec<TreeNode>,
    ) -> Result<(), TreeError> {
        let slot = self
            .forest
            .get(id)
            .ok_or_else(|| TreeError::NodeNotFound(id.to_string()))?;

        if !slot.has_children && !children.is_empty() {
            return Err(TreeError::NotExpandable(id.to_string()));
        }

        self.forest.replace_children(id, children)?;
        self.events.emit(TreeEvent::NodeLoaded { id: id.clone() });
        self.rebuild();
        Ok(())
    }

    /// Sets or clears the loading flag of a node.
    ///
    /// Only unloaded nodes start loading, and only loading nodes are reverted.
    pub fn set_node_loading(&mut self, id: &NodeId, loading: bool) -> Result<(), TreeError> {
        let slot = self
            .forest
            .get(id)
            .ok_or_else(|| TreeError::NodeNotFound(id.to_string()))?;

        let next = match (loading, slot.load_state) {
            (true, LoadState::Unloaded) if !slot.has_children => {
                return Err(TreeError::NotExpandable(id.to_string()));
            }
            (true, LoadState::Unloaded) => LoadState::Loading,
            (false, LoadState::Loading) => {
                if let Some(key) = self.loader_key(id) {
                    self.in_flight.finish(&key);
                }
                LoadState::Unloaded
            }
            (_, current) => current,
        };

        self.forest.set_load_state(id, next);
        self.rebuild();
        Ok(())
    }

    // --- Search ---

    /// Sets the search query and expands every node on a path to a match.
    ///
    /// Clearing the query keeps whatever the previous searches expanded.
    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.search_query = query.into();
        self.rebuild();

        if normalize_query(&self.search_query).is_some() {
            self.expanded.extend(collect_ids(&self.filtered));
        }
    }

    // --- Selection ---

    /// Selects a node.
    ///
    /// Tables open the detail panel, fetching their detail first unless it is
    /// cached. Views, functions, procedures and triggers emit their definition
    /// for the editor. Other kinds are ignored.
    pub fn select(&mut self, id: &NodeId) -> Result<Option<FetchRequest>, TreeError> {
        let slot = self
            .forest
            .get(id)
            .ok_or_else(|| TreeError::NodeNotFound(id.to_string()))?;

        match id {
            NodeId::Table { schema, name } => {
                let key = TableKey::new(schema.as_str(), name.as_str());

                if let Some(detail) = self.cache.get_table_detail(&key) {
                    self.pending_selection = None;
                    self.panel.show(key, detail);
                    self.events.emit(TreeEvent::PanelChanged);
                    return Ok(None);
                }

                self.pending_selection = Some(key.clone());
                Ok(self.begin_fetch(FetchKey::TableDetail(key)))
            }
            _ if slot.kind.carries_definition() => {
                let definition = slot.metadata.definition.clone().unwrap_or_default();
                self.events.emit(TreeEvent::InsertDefinition { definition });
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    pub async fn select_node(&mut self, id: &NodeId) -> Result<(), TreeError> {
        match self.select(id)? {
            Some(request) => self.run(request).await,
            None => Ok(()),
        }
    }

    pub fn set_active_tab(&mut self, tab: DetailTab) {
        self.panel.set_active_tab(tab);
        self.events.emit(TreeEvent::PanelChanged);
    }

    pub fn set_panel_open(&mut self, open: bool) {
        self.panel.set_open(open);
        self.events.emit(TreeEvent::PanelChanged);
    }

    /// Closes the panel and drops the selection. Cached detail is kept.
    pub fn close_panel(&mut self) {
        self.panel.close();
        self.pending_selection = None;
        self.events.emit(TreeEvent::PanelChanged);
    }

    // --- Fetch completion ---

    /// Applies the outcome of a fetch.
    ///
    /// On success the data is cached and, if the node that asked for it is
    /// still loading, its children are materialized. A failed fetch or a
    /// payload that does not validate reverts that node to unloaded, records
    /// the failure and returns it.
    pub fn apply_fetch(&mut self, outcome: FetchOutcome) -> Result<(), TreeError> {
        let FetchOutcome { key, result } = outcome;
        let elapsed = self.in_flight.finish(&key);

        match result.and_then(|data| self.apply_data(&key, data)) {
            Ok(()) => {
                match elapsed {
                    Some(elapsed) => log::info!("Loaded {} in {:.2?}", key, elapsed),
                    None => log::info!("Loaded {}", key),
                }
                self.rebuild();
                Ok(())
            }
            Err(error) => self.fail_fetch(key, error),
        }
    }

    fn apply_data(&mut self, key: &FetchKey, data: FetchedData) -> Result<(), TreeError> {
        match (key, data) {
            (FetchKey::SchemaList, FetchedData::Schemas(names)) => {
                validate_schema_names(&names)?;
                self.reconcile_schemas(&names);
            }
            (FetchKey::SchemaObjects { schema }, FetchedData::SchemaObjects(contents)) => {
                contents.validate()?;
                self.cache.put_schema_contents(schema.as_str(), contents);
                self.materialize_if_loading(key)?;
            }
            (FetchKey::TableDetail(table), FetchedData::TableDetail(detail)) => {
                detail.validate()?;
                let detail = self.cache.put_table_detail(table.clone(), detail);
                self.materialize_if_loading(key)?;

                if self.pending_selection.as_ref() == Some(table) {
                    self.pending_selection = None;
                    self.panel.show(table.clone(), detail);
                    self.events.emit(TreeEvent::PanelChanged);
                }
            }
            (key, _) => {
                return Err(TreeError::malformed(format!(
                    "unexpected payload for {}",
                    key
                )));
            }
        }

        Ok(())
    }

    /// Gives up on a fetch whose outcome will never be applied.
    ///
    /// The key stops counting as in flight and a node still loading from it
    /// goes back to unloaded, so the next toggle issues a fresh request.
    pub fn abandon_fetch(&mut self, key: &FetchKey) {
        if self.in_flight.finish(key).is_some() {
            log::debug!("Abandoned {}", key);
        }

        self.revert_waiting(key);
        self.rebuild();
    }

    fn fail_fetch(&mut self, key: FetchKey, error: TreeError) -> Result<(), TreeError> {
        let message = error.to_string();
        log::error!("Failed to load {}: {}", key, message);

        self.revert_waiting(&key);

        self.last_error = Some(FetchFailure {
            key: key.clone(),
            message: message.clone(),
        });
        self.events.emit(TreeEvent::FetchFailed { key, message });
        self.rebuild();

        Err(error)
    }

    // --- Internals ---

    async fn run(&mut self, request: FetchRequest) -> Result<(), TreeError> {
        let fetcher = self.fetcher.clone();
        let mut pending = PendingFetches::new(self, vec![request.key().clone()]);

        let outcome = request.execute(&*fetcher).await;

        pending.keys.clear();
        pending.store.apply_fetch(outcome)
    }

    /// Reverts whatever was waiting on `key`: the loading node and a pending
    /// table selection.
    fn revert_waiting(&mut self, key: &FetchKey) {
        if let Some(id) = node_for_key(key)
            && self.load_state(&id) == Some(LoadState::Loading)
        {
            self.forest.set_load_state(&id, LoadState::Unloaded);
            self.expanded.remove(&id);
        }

        if let FetchKey::TableDetail(table) = key
            && self.pending_selection.as_ref() == Some(table)
        {
            self.pending_selection = None;
        }
    }

    fn begin_fetch(&mut self, key: FetchKey) -> Option<FetchRequest> {
        if self.in_flight.begin(key.clone()) {
            Some(FetchRequest::new(key))
        } else {
            log::debug!("{} already in flight", key);
            None
        }
    }

    /// Starts loading the children of an unloaded node.
    fn begin_load(&mut self, id: &NodeId) -> Result<Option<FetchRequest>, TreeError> {
        let Some(key) = self.loader_key(id) else {
            log::debug!("No loader for {}, showing it empty", id);
            return Ok(None);
        };

        if let Some(children) = self.cached_children(&key) {
            self.forest.replace_children(id, children)?;
            self.events.emit(TreeEvent::NodeLoaded { id: id.clone() });
            return Ok(None);
        }

        self.forest.set_load_state(id, LoadState::Loading);
        Ok(self.begin_fetch(key))
    }

    fn loader_key(&self, id: &NodeId) -> Option<FetchKey> {
        match id {
            NodeId::Schema { name } => Some(FetchKey::schema_objects(name.as_str())),
            NodeId::Table { schema, name } if self.config.table_columns_in_tree => {
                Some(FetchKey::table_detail(schema.as_str(), name.as_str()))
            }
            _ => None,
        }
    }

    fn cached_children(&self, key: &FetchKey) -> Option<Vec<TreeNode>> {
        match key {
            FetchKey::SchemaList => None,
            FetchKey::SchemaObjects { schema } => self
                .cache
                .get_schema_contents(schema)
                .map(|contents| schema_children(schema, &contents, &self.config)),
            FetchKey::TableDetail(table) => self
                .cache
                .get_table_detail(table)
                .map(|detail| column_nodes(&table.schema, &table.table, &detail)),
        }
    }

    fn materialize_if_loading(&mut self, key: &FetchKey) -> Result<(), TreeError> {
        let Some(id) = node_for_key(key) else {
            return Ok(());
        };

        match self.load_state(&id) {
            Some(LoadState::Loading) => {}
            Some(_) => return Ok(()),
            None => {
                log::debug!("{} is gone, keeping {} in cache only", id, key);
                return Ok(());
            }
        }

        if let Some(children) = self.cached_children(key) {
            self.forest.replace_children(&id, children)?;
            self.events.emit(TreeEvent::NodeLoaded { id });
        }

        Ok(())
    }

    fn collapse_subtree(&mut self, id: &NodeId) {
        self.expanded.remove(id);
        for descendant in self.forest.descendant_ids(id) {
            self.expanded.remove(&descendant);
        }
    }

    fn rebuild(&mut self) {
        self.filtered = Arc::new(filter_forest(&self.forest.snapshot(), &self.search_query));
    }
}

/// Fetches started by an async wrapper. If the wrapper future is dropped
/// before the outcomes arrive, the remaining keys are abandoned.
struct PendingFetches<'a> {
    store: &'a mut SchemaTreeStore,
    keys: Vec<FetchKey>,
}

impl<'a> PendingFetches<'a> {
    fn new(store: &'a mut SchemaTreeStore, keys: Vec<FetchKey>) -> Self {
        Self { store, keys }
    }
}

impl Drop for PendingFetches<'_> {
    fn drop(&mut self) {
        for key in self.keys.drain(..) {
            self.store.abandon_fetch(&key);
        }
    }
}

/// The node whose children a fetch produces.
fn node_for_key(key: &FetchKey) -> Option<NodeId> {
    match key {
        FetchKey::SchemaList => None,
        FetchKey::SchemaObjects { schema } => Some(NodeId::schema(schema.as_str())),
        FetchKey::TableDetail(table) => {
            Some(NodeId::table(table.schema.as_str(), table.table.as_str()))
        }
    }
}
