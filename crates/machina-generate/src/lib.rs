//! Generator collaborator boundary.
//!
//! Given a component name and its root-first ancestry, a generator returns
//! candidate child parts. The trait is object-safe through explicit boxing
//! of the async return type, so the expansion controller stays
//! provider-agnostic.

pub mod groq;
pub mod payload;
pub mod prompt;

pub use groq::{DEFAULT_GROQ_URL, DEFAULT_MODEL, GroqClient};

use machina_core::PartSpec;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// One expansion request: the component to decompose plus the context that
/// disambiguates same-named parts at different hierarchy depths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationRequest {
    pub name: String,
    /// Root-first ancestor names; empty for the root component.
    pub ancestry: Vec<String>,
    /// Names of children the component already has, to bias the generator
    /// away from duplicates.
    pub existing_children: Vec<String>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerateError {
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("api error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("empty response from model")]
    EmptyResponse,
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

/// Async child-part generator. Implementations must not mutate any tree
/// state; the controller owns the merge.
pub trait ChildGenerator: Send + Sync {
    /// Produce the child parts for one component. The result is a
    /// non-empty ordered sequence of part descriptions, each possibly
    /// nested.
    fn generate_children(
        &self,
        request: GenerationRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<PartSpec>, GenerateError>> + Send + '_>>;
}
