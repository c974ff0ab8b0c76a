use crate::identity::IdentityResolver;
use machina_core::{ComponentId, ComponentKind, ComponentTree, MachinaError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// De-duplicated display identifier produced by the identity resolver.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VisualId(pub String);

impl fmt::Display for VisualId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Display-layer node: derived, never authoritative. The whole visual
/// graph is rebuilt from the canonical tree after every mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualNode {
    pub id: VisualId,
    pub component: ComponentId,
    pub label: String,
    pub kind: ComponentKind,
    pub depth: usize,
    pub has_children: bool,
    pub position: Vec2,
    pub newly_added: bool,
    pub focused: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualEdge {
    pub id: String,
    pub source: VisualId,
    pub target: VisualId,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisualGraph {
    pub nodes: Vec<VisualNode>,
    pub edges: Vec<VisualEdge>,
    index: HashMap<VisualId, usize>,
    by_component: HashMap<ComponentId, VisualId>,
}

impl VisualGraph {
    /// Full rebuild from a tree snapshot: pre-order walk, resolver-assigned
    /// ids, one directed edge per parent-child relation. Positions start at
    /// the origin until a layout pass is applied.
    pub fn build(tree: &ComponentTree) -> Self {
        let mut resolver = IdentityResolver::new();
        resolver.reset();

        let mut graph = VisualGraph::default();
        for component_id in tree.preorder() {
            let node = &tree[component_id];
            let id = resolver.resolve(&node.name);

            if let Some(parent) = node.parent {
                // Pre-order guarantees the parent was already visited.
                if let Some(parent_vid) = graph.by_component.get(&parent).cloned() {
                    graph.edges.push(VisualEdge {
                        id: format!("{parent_vid}-{id}"),
                        source: parent_vid,
                        target: id.clone(),
                    });
                }
            }

            graph.index.insert(id.clone(), graph.nodes.len());
            graph.by_component.insert(component_id, id.clone());
            graph.nodes.push(VisualNode {
                id,
                component: component_id,
                label: node.name.clone(),
                kind: node.kind,
                depth: tree.depth(component_id),
                has_children: !node.children.is_empty(),
                position: Vec2::default(),
                newly_added: false,
                focused: false,
            });
        }
        graph
    }

    pub fn node(&self, id: &VisualId) -> Option<&VisualNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn node_index(&self, id: &VisualId) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn id_for(&self, component: ComponentId) -> Option<&VisualId> {
        self.by_component.get(&component)
    }

    /// Carry positions over from the previous rebuild so unchanged nodes do
    /// not jump to the origin while a layout pass is pending.
    pub fn inherit_positions(&mut self, previous: &VisualGraph) {
        for node in &mut self.nodes {
            if let Some(prev) = previous.node(&node.id) {
                node.position = prev.position;
            }
        }
    }

    /// Map a layout result back onto the nodes. An id we asked for but did
    /// not get back keeps its previous position; that is an invariant
    /// violation worth a warning, not a crash.
    pub fn apply_positions(&mut self, positions: &HashMap<VisualId, (f32, f32)>) {
        for node in &mut self.nodes {
            match positions.get(&node.id) {
                Some(&(x, y)) => node.position = Vec2::new(x, y),
                None => {
                    let err = MachinaError::LayoutInconsistency {
                        id: node.id.0.clone(),
                    };
                    tracing::warn!(%err, "keeping previous position");
                }
            }
        }
    }

    pub fn mark_new(&mut self, components: &[ComponentId]) {
        let ids: Vec<VisualId> = components
            .iter()
            .filter_map(|c| self.by_component.get(c).cloned())
            .collect();
        for node in &mut self.nodes {
            node.newly_added = ids.contains(&node.id);
        }
    }

    pub fn set_focused(&mut self, component: Option<ComponentId>) {
        for node in &mut self.nodes {
            node.focused = Some(node.component) == component;
        }
    }

    pub fn clear_transient_marks(&mut self) {
        for node in &mut self.nodes {
            node.newly_added = false;
            node.focused = false;
        }
    }
}
