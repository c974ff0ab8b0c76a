pub mod graph;
pub mod identity;
pub mod layout;

pub use graph::{Vec2, VisualEdge, VisualGraph, VisualId, VisualNode};
pub use identity::{IdentityResolver, ID_SEPARATOR};
pub use layout::{LayeredLayouter, Layouter};
