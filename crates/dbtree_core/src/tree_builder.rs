//! Turns fetched metadata into tree nodes.

use crate::{
    FolderKind, NodeId, NodeMetadata, SchemaContents, TableDetail, TreeConfig, TreeNode,
};

/// Folder nodes for one schema, in [`FolderKind::ALL`] order.
///
/// Folders are loaded as soon as they are built. Kinds without members are
/// left out unless `show_empty_folders` is set.
pub fn schema_children(
    schema: &str,
    contents: &SchemaContents,
    config: &TreeConfig,
) -> Vec<TreeNode> {
    FolderKind::ALL
        .into_iter()
        .filter_map(|kind| {
            let members = folder_members(schema, kind, contents, config);

            if members.is_empty() && !config.show_empty_folders {
                return None;
            }

            Some(folder_node(schema, kind, members))
        })
        .collect()
}

fn folder_node(schema: &str, kind: FolderKind, members: Vec<TreeNode>) -> TreeNode {
    TreeNode::new(NodeId::folder(schema, kind), kind.label(), !members.is_empty())
        .with_metadata(NodeMetadata::for_schema(schema))
        .with_children(members)
}

fn folder_members(
    schema: &str,
    kind: FolderKind,
    contents: &SchemaContents,
    config: &TreeConfig,
) -> Vec<TreeNode> {
    match kind {
        FolderKind::Tables => contents
            .tables
            .iter()
            .map(|table| table_node(schema, table, config))
            .collect(),
        FolderKind::Views => contents
            .views
            .iter()
            .map(|view| {
                TreeNode::leaf(NodeId::view(schema, &view.name), &view.name).with_metadata(
                    NodeMetadata::for_schema(schema).with_definition(&view.definition),
                )
            })
            .collect(),
        FolderKind::Procedures => contents
            .procedures
            .iter()
            .map(|procedure| {
                TreeNode::leaf(NodeId::procedure(schema, &procedure.name), &procedure.name)
                    .with_metadata(
                        NodeMetadata::for_schema(schema).with_definition(&procedure.definition),
                    )
            })
            .collect(),
        FolderKind::Functions => contents
            .functions
            .iter()
            .map(|function| {
                let metadata = NodeMetadata {
                    return_type: Some(function.return_type.clone()),
                    ..NodeMetadata::for_schema(schema).with_definition(&function.definition)
                };

                TreeNode::leaf(NodeId::function(schema, &function.name), &function.name)
                    .with_metadata(metadata)
            })
            .collect(),
        FolderKind::Triggers => contents
            .triggers
            .iter()
            .map(|trigger| {
                TreeNode::leaf(
                    NodeId::trigger(schema, &trigger.table, &trigger.name),
                    &trigger.name,
                )
                .with_metadata(
                    NodeMetadata::for_table(schema, &trigger.table)
                        .with_definition(&trigger.definition),
                )
            })
            .collect(),
    }
}

fn table_node(schema: &str, table: &str, config: &TreeConfig) -> TreeNode {
    let id = NodeId::table(schema, table);
    let metadata = NodeMetadata::for_table(schema, table);

    if config.table_columns_in_tree {
        TreeNode::new(id, table, true).with_metadata(metadata)
    } else {
        TreeNode::leaf(id, table).with_metadata(metadata)
    }
}

/// Column leaves of a table, in fetch order.
pub fn column_nodes(schema: &str, table: &str, detail: &TableDetail) -> Vec<TreeNode> {
    detail
        .columns
        .iter()
        .map(|column| {
            let metadata = NodeMetadata {
                data_type: Some(column.data_type.clone()),
                nullable: Some(column.nullable),
                is_primary_key: column.is_primary_key,
                is_foreign_key: column.is_foreign_key,
                ..NodeMetadata::for_table(schema, table)
            };

            TreeNode::leaf(NodeId::column(schema, table, &column.name), &column.name)
                .with_metadata(metadata)
        })
        .collect()
}
