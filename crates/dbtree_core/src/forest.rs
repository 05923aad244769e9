use std::collections::{HashMap, HashSet};

use crate::{LoadState, NodeId, NodeKind, NodeMetadata, TreeError, TreeNode};

/// Arena entry for one node. Children are referenced by id.
#[derive(Debug, Clone)]
pub(crate) struct Slot {
    pub(crate) name: String,
    pub(crate) kind: NodeKind,
    pub(crate) has_children: bool,
    pub(crate) load_state: LoadState,
    pub(crate) metadata: NodeMetadata,
    pub(crate) parent: Option<NodeId>,

    /// `Some` exactly when the node is loaded.
    pub(crate) children: Option<Vec<NodeId>>,
}

/// Id-indexed storage for the schema forest.
///
/// Updates address a node directly by id and swap its child list wholesale;
/// nothing outside the replaced branch is touched.
#[derive(Debug, Default)]
pub(crate) struct Forest {
    roots: Vec<NodeId>,
    slots: HashMap<NodeId, Slot>,
}

impl Forest {
    pub(crate) fn from_roots(roots: Vec<TreeNode>) -> Result<Self, TreeError> {
        branch_ids(&roots)?;

        let mut forest = Self::default();
        for root in roots {
            forest.roots.push(root.id.clone());
            forest.insert_branch(root, None);
        }

        Ok(forest)
    }

    pub(crate) fn get(&self, id: &NodeId) -> Option<&Slot> {
        self.slots.get(id)
    }

    pub(crate) fn contains(&self, id: &NodeId) -> bool {
        self.slots.contains_key(id)
    }

    pub(crate) fn set_load_state(&mut self, id: &NodeId, state: LoadState) {
        if let Some(slot) = self.slots.get_mut(id) {
            slot.load_state = state;
        }
    }

    /// Swaps the children of `id` for `children`, marking it loaded.
    ///
    /// The previous branch below `id` is dropped. Fails without changes if an
    /// incoming id is duplicated or already used outside that branch.
    pub(crate) fn replace_children(
        &mut self,
        id: &NodeId,
        children: Vec<TreeNode>,
    ) -> Result<(), TreeError> {
        if !self.contains(id) {
            return Err(TreeError::NodeNotFound(id.to_string()));
        }

        let incoming = branch_ids(&children)?;
        let replaced: HashSet<NodeId> = self.descendant_ids(id).into_iter().collect();

        if let Some(clash) = incoming
            .iter()
            .find(|child| *child == id || (self.contains(child) && !replaced.contains(*child)))
        {
            return Err(TreeError::malformed(format!(
                "node {} already exists outside {}",
                clash, id
            )));
        }

        self.remove_descendants(id);

        let child_ids: Vec<NodeId> = children.iter().map(|child| child.id.clone()).collect();
        for child in children {
            self.insert_branch(child, Some(id.clone()));
        }

        if let Some(slot) = self.slots.get_mut(id) {
            slot.has_children = !child_ids.is_empty();
            slot.load_state = LoadState::Loaded;
            slot.children = Some(child_ids);
        }

        Ok(())
    }

    /// Replaces the roots with one schema node per name, in order.
    ///
    /// Roots that survive keep their branch; new ones start unloaded.
    pub(crate) fn reconcile_schemas(&mut self, names: &[String]) {
        let wanted: Vec<NodeId> = names.iter().map(|name| NodeId::schema(name.as_str())).collect();
        let keep: HashSet<&NodeId> = wanted.iter().collect();

        for root in std::mem::take(&mut self.roots) {
            if !keep.contains(&root) {
                self.remove_descendants(&root);
                self.slots.remove(&root);
            }
        }

        for (id, name) in wanted.iter().zip(names) {
            if !self.contains(id) {
                self.insert_branch(TreeNode::schema(name.as_str()), None);
            }
        }

        self.roots = wanted;
    }

    /// Every id below `id`, following loaded children.
    pub(crate) fn descendant_ids(&self, id: &NodeId) -> Vec<NodeId> {
        let mut ids = Vec::new();
        let mut stack: Vec<&NodeId> = self.child_ids(id).iter().rev().collect();

        while let Some(current) = stack.pop() {
            ids.push(current.clone());
            stack.extend(self.child_ids(current).iter().rev());
        }

        ids
    }

    /// Ids from the root down to the parent of `id`.
    pub(crate) fn ancestors(&self, id: &NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut current = self.slots.get(id).and_then(|slot| slot.parent.clone());

        while let Some(parent) = current {
            current = self.slots.get(&parent).and_then(|slot| slot.parent.clone());
            chain.push(parent);
        }

        chain.reverse();
        chain
    }

    /// Every id in the forest, in display order.
    pub(crate) fn all_ids(&self) -> Vec<NodeId> {
        let mut ids = Vec::with_capacity(self.slots.len());

        for root in &self.roots {
            ids.push(root.clone());
            ids.extend(self.descendant_ids(root));
        }

        ids
    }

    /// Materializes the branch rooted at `id`.
    pub(crate) fn build(&self, id: &NodeId) -> Option<TreeNode> {
        let slot = self.slots.get(id)?;

        let children = slot
            .children
            .as_ref()
            .map(|ids| ids.iter().filter_map(|child| self.build(child)).collect());

        Some(TreeNode {
            id: id.clone(),
            name: slot.name.clone(),
            kind: slot.kind,
            has_children: slot.has_children,
            load_state: slot.load_state,
            metadata: slot.metadata.clone(),
            children,
        })
    }

    pub(crate) fn snapshot(&self) -> Vec<TreeNode> {
        self.roots.iter().filter_map(|root| self.build(root)).collect()
    }

    fn child_ids(&self, id: &NodeId) -> &[NodeId] {
        self.slots
            .get(id)
            .and_then(|slot| slot.children.as_deref())
            .unwrap_or(&[])
    }

    fn insert_branch(&mut self, node: TreeNode, parent: Option<NodeId>) {
        let TreeNode {
            id,
            name,
            kind,
            has_children,
            load_state,
            metadata,
            children,
        } = node;

        let children = match load_state {
            LoadState::Loaded => children.unwrap_or_default(),
            LoadState::Unloaded | LoadState::Loading => Vec::new(),
        };

        let child_ids = (load_state == LoadState::Loaded)
            .then(|| children.iter().map(|child| child.id.clone()).collect());

        self.slots.insert(
            id.clone(),
            Slot {
                name,
                kind,
                has_children,
                load_state,
                metadata,
                parent,
                children: child_ids,
            },
        );

        for child in children {
            self.insert_branch(child, Some(id.clone()));
        }
    }

    fn remove_descendants(&mut self, id: &NodeId) {
        let mut stack = self.child_ids(id).to_vec();

        while let Some(current) = stack.pop() {
            if let Some(slot) = self.slots.remove(&current) {
                stack.extend(slot.children.into_iter().flatten());
            }
        }
    }
}

/// Ids of a batch of branches, following loaded children. Rejects duplicates.
fn branch_ids(nodes: &[TreeNode]) -> Result<HashSet<NodeId>, TreeError> {
    let mut seen = HashSet::new();
    let mut stack: Vec<&TreeNode> = nodes.iter().collect();

    while let Some(node) = stack.pop() {
        if !seen.insert(node.id.clone()) {
            return Err(TreeError::malformed(format!("duplicate node id {}", node.id)));
        }

        if node.is_loaded() {
            stack.extend(node.children());
        }
    }

    Ok(seen)
}
