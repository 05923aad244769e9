use serde::{Deserialize, Serialize};

use crate::NodeId;

/// The kind of entry a tree node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Schema,
    Table,
    View,
    Function,
    Procedure,
    Trigger,
    Column,
    Folder,
}

impl NodeKind {
    /// Kinds whose selection yields SQL source text for the editor.
    pub fn carries_definition(self) -> bool {
        matches!(
            self,
            NodeKind::View | NodeKind::Function | NodeKind::Procedure | NodeKind::Trigger
        )
    }
}

/// Loading lifecycle of a node's children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    #[default]
    Unloaded,
    Loading,
    Loaded,
}

/// Optional attributes carried by a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,

    #[serde(default)]
    pub is_primary_key: bool,

    #[serde(default)]
    pub is_foreign_key: bool,

    /// SQL body of a view, function, procedure or trigger.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
}

impl NodeMetadata {
    pub fn for_schema(schema: impl Into<String>) -> Self {
        Self {
            schema_name: Some(schema.into()),
            ..Self::default()
        }
    }

    pub fn for_table(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema_name: Some(schema.into()),
            table_name: Some(table.into()),
            ..Self::default()
        }
    }

    pub fn with_definition(mut self, definition: impl Into<String>) -> Self {
        self.definition = Some(definition.into());
        self
    }
}

/// One entry of the schema tree.
///
/// Values of this type are what callers hand to the store and what the store
/// hands back in snapshots. The store never mutates a node in place: every
/// change produces a new value for that id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,

    /// Expansion affordance, independent of whether children are present.
    pub has_children: bool,

    pub load_state: LoadState,

    #[serde(default)]
    pub metadata: NodeMetadata,

    /// `None` until the node is loaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<TreeNode>>,
}

impl TreeNode {
    /// An unloaded node with the given expansion affordance.
    pub fn new(id: NodeId, name: impl Into<String>, has_children: bool) -> Self {
        let kind = id.kind();
        Self {
            id,
            name: name.into(),
            kind,
            has_children,
            load_state: LoadState::Unloaded,
            metadata: NodeMetadata::default(),
            children: None,
        }
    }

    /// A root schema node awaiting its first expansion.
    pub fn schema(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(NodeId::schema(name.clone()), name.clone(), true)
            .with_metadata(NodeMetadata::for_schema(name))
    }

    /// A loaded node without children.
    pub fn leaf(id: NodeId, name: impl Into<String>) -> Self {
        Self::new(id, name, false).with_children(Vec::new())
    }

    pub fn with_metadata(mut self, metadata: NodeMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Marks the node loaded with exactly these children.
    pub fn with_children(mut self, children: Vec<TreeNode>) -> Self {
        self.load_state = LoadState::Loaded;
        self.children = Some(children);
        self
    }

    pub fn is_loaded(&self) -> bool {
        self.load_state == LoadState::Loaded
    }

    /// Children that are materialized, or an empty slice.
    pub fn children(&self) -> &[TreeNode] {
        self.children.as_deref().unwrap_or(&[])
    }

    /// Finds a node by id in this branch.
    pub fn find(&self, id: &NodeId) -> Option<&TreeNode> {
        if &self.id == id {
            return Some(self);
        }

        self.children().iter().find_map(|child| child.find(id))
    }
}

/// Finds a node by id anywhere in a forest.
pub fn find_in_forest<'a>(forest: &'a [TreeNode], id: &NodeId) -> Option<&'a TreeNode> {
    forest.iter().find_map(|root| root.find(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_node_starts_unloaded_and_expandable() {
        let node = TreeNode::schema("public");

        assert_eq!(node.id, NodeId::schema("public"));
        assert_eq!(node.kind, NodeKind::Schema);
        assert!(node.has_children);
        assert_eq!(node.load_state, LoadState::Unloaded);
        assert!(node.children.is_none());
        assert_eq!(node.metadata.schema_name.as_deref(), Some("public"));
    }

    #[test]
    fn leaf_is_loaded_without_children() {
        let node = TreeNode::leaf(NodeId::table("public", "users"), "users");

        assert!(node.is_loaded());
        assert!(!node.has_children);
        assert!(node.children().is_empty());
    }

    #[test]
    fn find_walks_loaded_children() {
        let column = TreeNode::leaf(NodeId::column("public", "users", "id"), "id");
        let table = TreeNode::new(NodeId::table("public", "users"), "users", true)
            .with_children(vec![column.clone()]);
        let forest = vec![TreeNode::schema("other"), table];

        let found = find_in_forest(&forest, &column.id).unwrap();
        assert_eq!(found.id, column.id);
        assert!(find_in_forest(&forest, &NodeId::schema("missing")).is_none());
    }

    #[test]
    fn definition_kinds() {
        assert!(NodeKind::View.carries_definition());
        assert!(NodeKind::Trigger.carries_definition());
        assert!(!NodeKind::Table.carries_definition());
        assert!(!NodeKind::Folder.carries_definition());
    }
}
