use crate::graph::{Vec2, VisualGraph, VisualId};
use std::collections::HashMap;

pub trait Layouter {
    fn execute(&self, graph: &VisualGraph) -> HashMap<VisualId, (f32, f32)>;
}

/// Top-down layered layout for the decomposition tree.
///
/// Every node is a uniform fixed-size box; rank is graph depth. Two
/// barycenter sweeps reduce edge crossings, and all sorts are stable so
/// ties keep the input (model) order: repeated layouts of an unchanged
/// subtree never reshuffle siblings.
pub struct LayeredLayouter {
    pub node_size: Vec2,
    /// Spacing between neighboring boxes within one layer
    pub node_spacing: f32,
    /// Vertical gap between layers
    pub layer_spacing: f32,
}

impl Default for LayeredLayouter {
    fn default() -> Self {
        Self {
            node_size: Vec2::new(Self::NODE_WIDTH, Self::NODE_HEIGHT),
            node_spacing: Self::NODE_SPACING,
            layer_spacing: Self::LAYER_SPACING,
        }
    }
}

struct Relations {
    parents: Vec<Vec<usize>>,
    children: Vec<Vec<usize>>,
}

impl LayeredLayouter {
    pub const NODE_WIDTH: f32 = 250.0;
    pub const NODE_HEIGHT: f32 = 100.0;
    pub const NODE_SPACING: f32 = 80.0;
    pub const LAYER_SPACING: f32 = 100.0;

    const BARYCENTER_PASSES: usize = 2;

    fn build_relations(graph: &VisualGraph) -> Relations {
        let n = graph.nodes.len();
        let mut relations = Relations {
            parents: vec![Vec::new(); n],
            children: vec![Vec::new(); n],
        };

        for edge in &graph.edges {
            let (Some(source), Some(target)) = (
                graph.node_index(&edge.source),
                graph.node_index(&edge.target),
            ) else {
                tracing::warn!(edge = %edge.id, "dropping edge with unresolved endpoint");
                continue;
            };
            relations.children[source].push(target);
            relations.parents[target].push(source);
        }
        relations
    }

    /// Layers keyed by depth, each layer listing node indices in model
    /// order. Depth comes from the rebuilt snapshot, so it always matches
    /// the parent chain.
    fn build_layers(graph: &VisualGraph) -> Vec<Vec<usize>> {
        let max_depth = graph.nodes.iter().map(|n| n.depth).max().unwrap_or(0);
        let mut layers: Vec<Vec<usize>> = vec![Vec::new(); max_depth + 1];
        for (idx, node) in graph.nodes.iter().enumerate() {
            layers[node.depth].push(idx);
        }
        layers
    }

    fn slot_coords(layers: &[Vec<usize>], node_count: usize, slot: f32) -> Vec<f32> {
        let mut coords = vec![0.0; node_count];
        for layer in layers {
            for (j, &idx) in layer.iter().enumerate() {
                coords[idx] = j as f32 * slot;
            }
        }
        coords
    }

    /// Reorder one layer by the mean coordinate of each node's neighbors
    /// in the adjacent layer. The sort is stable: nodes without neighbors,
    /// and exact ties, keep their current (model) order.
    fn order_layer_by_barycenter(
        layer: &mut [usize],
        coords: &[f32],
        neighbors: &[Vec<usize>],
    ) {
        let barycenter = |idx: usize| -> f32 {
            let adjacent = &neighbors[idx];
            if adjacent.is_empty() {
                coords[idx]
            } else {
                adjacent.iter().map(|&n| coords[n]).sum::<f32>() / adjacent.len() as f32
            }
        };

        layer.sort_by(|&a, &b| {
            barycenter(a)
                .partial_cmp(&barycenter(b))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    fn run_barycenter_passes(
        layers: &mut [Vec<usize>],
        coords: &mut Vec<f32>,
        relations: &Relations,
        node_count: usize,
        slot: f32,
    ) {
        for _ in 0..Self::BARYCENTER_PASSES {
            for rank in 1..layers.len() {
                Self::order_layer_by_barycenter(&mut layers[rank], coords, &relations.parents);
                *coords = Self::slot_coords(layers, node_count, slot);
            }
            for rank in (0..layers.len().saturating_sub(1)).rev() {
                Self::order_layer_by_barycenter(&mut layers[rank], coords, &relations.children);
                *coords = Self::slot_coords(layers, node_count, slot);
            }
        }
    }
}

impl Layouter for LayeredLayouter {
    fn execute(&self, graph: &VisualGraph) -> HashMap<VisualId, (f32, f32)> {
        let mut positions = HashMap::with_capacity(graph.nodes.len());
        if graph.nodes.is_empty() {
            return positions;
        }

        let relations = Self::build_relations(graph);
        let mut layers = Self::build_layers(graph);
        let slot = self.node_size.x + self.node_spacing;
        let mut coords = Self::slot_coords(&layers, graph.nodes.len(), slot);
        Self::run_barycenter_passes(
            &mut layers,
            &mut coords,
            &relations,
            graph.nodes.len(),
            slot,
        );

        for (rank, layer) in layers.iter().enumerate() {
            if layer.is_empty() {
                continue;
            }
            let extent = layer.len() as f32 * self.node_size.x
                + (layer.len() - 1) as f32 * self.node_spacing;
            let y = rank as f32 * (self.node_size.y + self.layer_spacing);
            for (j, &idx) in layer.iter().enumerate() {
                let x = -extent / 2.0 + j as f32 * slot;
                positions.insert(graph.nodes[idx].id.clone(), (x, y));
            }
        }
        positions
    }
}
