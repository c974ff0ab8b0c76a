use crate::{ComponentId, ComponentKind, MachinaError, PartSpec};
use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// One node of the decomposition tree.
///
/// `parent` is a lookup-only back-edge; ownership runs strictly
/// parent -> children through the arena indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    pub kind: ComponentKind,
    pub parent: Option<ComponentId>,
    pub children: Vec<ComponentId>,
}

/// Arena-backed decomposition tree. Nodes are append-only: expansion adds
/// subtrees, nothing is ever deleted or reparented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentTree {
    nodes: Vec<Component>,
    root: ComponentId,
}

impl ComponentTree {
    /// Build a tree holding a single root node with no children.
    pub fn new(name: impl Into<String>) -> Result<Self, MachinaError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(MachinaError::InvalidInput(
                "component name must not be empty".to_string(),
            ));
        }
        Ok(Self {
            nodes: vec![Component {
                name,
                kind: ComponentKind::Machine,
                parent: None,
                children: Vec::new(),
            }],
            root: ComponentId(0),
        })
    }

    pub fn root(&self) -> ComponentId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: ComponentId) -> Option<&Component> {
        self.nodes.get(id.0)
    }

    pub fn get_mut(&mut self, id: ComponentId) -> Option<&mut Component> {
        self.nodes.get_mut(id.0)
    }

    pub fn contains(&self, id: ComponentId) -> bool {
        id.0 < self.nodes.len()
    }

    /// Append generated subtrees under `target`, in order. The whole
    /// inserted subtree gets consistent parent links before this returns.
    ///
    /// Validation happens up front so a rejected payload leaves the tree
    /// untouched. Not idempotent: the caller prevents duplicate requests.
    ///
    /// Returns the ids of the immediate (first-level) children added.
    pub fn append_children(
        &mut self,
        target: ComponentId,
        specs: &[PartSpec],
    ) -> Result<Vec<ComponentId>, MachinaError> {
        if !self.contains(target) {
            return Err(MachinaError::InvalidInput(format!(
                "unknown component id {target}"
            )));
        }
        Self::validate_specs(specs)?;

        let direct: Vec<ComponentId> = specs
            .iter()
            .map(|spec| self.materialize(spec, target))
            .collect();
        self.nodes[target.0].children.extend(direct.iter().copied());
        Ok(direct)
    }

    fn validate_specs(specs: &[PartSpec]) -> Result<(), MachinaError> {
        for spec in specs {
            if spec.name.trim().is_empty() {
                return Err(MachinaError::InvalidInput(
                    "generated child has an empty name".to_string(),
                ));
            }
            Self::validate_specs(&spec.children)?;
        }
        Ok(())
    }

    /// Allocate a node for `spec` and, recursively, its nested children.
    /// Only fills the new node's own child list; the caller links it into
    /// the parent's list.
    fn materialize(&mut self, spec: &PartSpec, parent: ComponentId) -> ComponentId {
        let id = ComponentId(self.nodes.len());
        self.nodes.push(Component {
            name: spec.name.clone(),
            kind: spec.kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        let grandchildren: Vec<ComponentId> = spec
            .children
            .iter()
            .map(|child| self.materialize(child, id))
            .collect();
        self.nodes[id.0].children = grandchildren;
        id
    }

    /// Root-first names of the proper ancestors of `id` (empty for the
    /// root). O(depth).
    pub fn ancestry_of(&self, id: ComponentId) -> Vec<String> {
        let mut names = Vec::new();
        let mut current = self.get(id).and_then(|c| c.parent);
        while let Some(ancestor) = current {
            let node = &self.nodes[ancestor.0];
            names.push(node.name.clone());
            current = node.parent;
        }
        names.reverse();
        names
    }

    /// Depth of `id` below the root (root = 0).
    pub fn depth(&self, id: ComponentId) -> usize {
        let mut depth = 0;
        let mut current = self.get(id).and_then(|c| c.parent);
        while let Some(ancestor) = current {
            depth += 1;
            current = self.nodes[ancestor.0].parent;
        }
        depth
    }

    /// Pre-order depth-first search, children in insertion order.
    pub fn find(&self, predicate: impl Fn(&Component) -> bool) -> Option<ComponentId> {
        self.preorder().find(|&id| predicate(&self.nodes[id.0]))
    }

    /// Pre-order traversal over the whole tree. Deterministic: children are
    /// visited in insertion (generation) order.
    pub fn preorder(&self) -> Preorder<'_> {
        Preorder {
            tree: self,
            stack: vec![self.root],
        }
    }
}

impl Index<ComponentId> for ComponentTree {
    type Output = Component;
    fn index(&self, id: ComponentId) -> &Self::Output {
        &self.nodes[id.0]
    }
}

impl IndexMut<ComponentId> for ComponentTree {
    fn index_mut(&mut self, id: ComponentId) -> &mut Self::Output {
        &mut self.nodes[id.0]
    }
}

pub struct Preorder<'a> {
    tree: &'a ComponentTree,
    stack: Vec<ComponentId>,
}

impl Iterator for Preorder<'_> {
    type Item = ComponentId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let node = &self.tree.nodes[id.0];
        self.stack.extend(node.children.iter().rev().copied());
        Some(id)
    }
}
