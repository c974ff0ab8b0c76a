use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub mod tree;

pub use tree::{Component, ComponentTree};

/// Canonical identity of a component, minted once at creation and never
/// reused. Display ids derived from names can shift between rebuilds;
/// this one cannot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ComponentId(pub usize);

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Classification of a part in the bill-of-materials hierarchy.
///
/// `Material` marks stock material that cannot be decomposed further; the
/// classification arrives with the generated payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    #[serde(rename = "machine")]
    Machine,
    #[default]
    #[serde(rename = "component")]
    Assembly,
    #[serde(rename = "material")]
    Material,
}

impl ComponentKind {
    pub fn is_expandable(&self) -> bool {
        !matches!(self, ComponentKind::Material)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ComponentKind::Machine => "machine",
            ComponentKind::Assembly => "component",
            ComponentKind::Material => "material",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One generated child description, possibly carrying nested grandchildren.
/// This is the payload contract with the generator collaborator: single-level
/// responses have empty `children`, multi-level responses nest recursively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartSpec {
    pub name: String,
    #[serde(default)]
    pub kind: ComponentKind,
    #[serde(default)]
    pub children: Vec<PartSpec>,
}

impl PartSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ComponentKind::default(),
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<PartSpec>) -> Self {
        self.children = children;
        self
    }

    pub fn with_kind(mut self, kind: ComponentKind) -> Self {
        self.kind = kind;
        self
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MachinaError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("generation failed: {0}")]
    Generation(String),
    #[error("layout result omitted node '{id}'")]
    LayoutInconsistency { id: String },
}
