use crate::graph::VisualId;
use std::collections::HashMap;

/// Separator between a colliding base name and its occurrence count.
/// Base names are assumed not to end in `-<digits>` themselves.
pub const ID_SEPARATOR: char = '-';

/// Assigns unique display ids to components during one full tree
/// traversal. Component names collide (two branches can both produce
/// "Bolt"); the visualization needs unique node ids.
///
/// The counter table is reset before each traversal, so ids are
/// reproducible across rebuilds as long as the pre-order prefix up to a
/// node is unchanged.
#[derive(Debug, Default)]
pub struct IdentityResolver {
    counts: HashMap<String, usize>,
}

impl IdentityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget all counts. Call before starting a new root-to-leaves pass.
    pub fn reset(&mut self) {
        self.counts.clear();
    }

    /// Id for the next pre-order occurrence of `name`: the bare name the
    /// first time, `name-N` afterwards.
    pub fn resolve(&mut self, name: &str) -> VisualId {
        let count = self.counts.entry(name.to_string()).or_insert(0);
        *count += 1;
        if *count == 1 {
            VisualId(name.to_string())
        } else {
            VisualId(format!("{name}{ID_SEPARATOR}{count}"))
        }
    }

    /// Recover the base name from a resolved id by stripping one trailing
    /// `-<digits>` suffix, if present.
    pub fn base_name(id: &VisualId) -> &str {
        let raw = id.0.as_str();
        if let Some(pos) = raw.rfind(ID_SEPARATOR) {
            let suffix = &raw[pos + 1..];
            if !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()) {
                return &raw[..pos];
            }
        }
        raw
    }
}
