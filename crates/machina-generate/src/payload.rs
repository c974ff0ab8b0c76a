//! Structural validation of generated child payloads.
//!
//! Any payload that is not an object, lacks a `children` list, carries a
//! nameless child, or misses the requested arity is rejected wholesale;
//! the controller treats that as total request failure with no merge.

use crate::GenerateError;
use machina_core::PartSpec;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ChildrenPayload {
    children: Vec<PartSpec>,
}

/// Parse and validate the model's JSON answer.
///
/// `expected` is the exact number of top-level children the prompt asked
/// for; `None` accepts any non-empty list. Nested levels are validated for
/// well-formed names but not for arity, since multi-level responses choose
/// their own fan-out.
pub fn parse_children(
    content: &str,
    expected: Option<usize>,
) -> Result<Vec<PartSpec>, GenerateError> {
    let payload: ChildrenPayload = serde_json::from_str(content)
        .map_err(|e| GenerateError::InvalidPayload(e.to_string()))?;

    if payload.children.is_empty() {
        return Err(GenerateError::InvalidPayload(
            "children list is empty".to_string(),
        ));
    }
    if let Some(expected) = expected
        && payload.children.len() != expected
    {
        return Err(GenerateError::InvalidPayload(format!(
            "expected exactly {expected} children, got {}",
            payload.children.len()
        )));
    }
    validate_names(&payload.children)?;
    Ok(payload.children)
}

fn validate_names(specs: &[PartSpec]) -> Result<(), GenerateError> {
    for spec in specs {
        if spec.name.trim().is_empty() {
            return Err(GenerateError::InvalidPayload(
                "child with empty name".to_string(),
            ));
        }
        validate_names(&spec.children)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_two_flat_children() {
        let content = r#"{"children":[{"name":"Frame","children":[]},{"name":"Wheel Assembly","children":[]}]}"#;
        let children = parse_children(content, Some(2)).unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].name, "Frame");
        assert!(children[0].children.is_empty());
    }

    #[test]
    fn test_accepts_nested_grandchildren() {
        let content = r#"{"children":[
            {"name":"Frame","children":[{"name":"Top Tube"}]},
            {"name":"Fork","children":[]}
        ]}"#;
        let children = parse_children(content, Some(2)).unwrap();
        assert_eq!(children[0].children[0].name, "Top Tube");
    }

    #[test]
    fn test_rejects_wrong_arity() {
        let content = r#"{"children":[{"name":"Frame"}]}"#;
        let err = parse_children(content, Some(2)).unwrap_err();
        assert!(matches!(err, GenerateError::InvalidPayload(_)));
    }

    #[test]
    fn test_any_arity_when_unconstrained() {
        let content = r#"{"children":[{"name":"Frame"},{"name":"Fork"},{"name":"Seat"}]}"#;
        assert_eq!(parse_children(content, None).unwrap().len(), 3);
    }

    #[test]
    fn test_rejects_empty_children_list() {
        let err = parse_children(r#"{"children":[]}"#, None).unwrap_err();
        assert!(matches!(err, GenerateError::InvalidPayload(_)));
    }

    #[test]
    fn test_rejects_missing_children_key() {
        let err = parse_children(r#"{"parts":[]}"#, None).unwrap_err();
        assert!(matches!(err, GenerateError::InvalidPayload(_)));
    }

    #[test]
    fn test_rejects_non_object_payload() {
        let err = parse_children(r#"["Frame","Fork"]"#, None).unwrap_err();
        assert!(matches!(err, GenerateError::InvalidPayload(_)));
    }

    #[test]
    fn test_rejects_nameless_nested_child() {
        let content = r#"{"children":[{"name":"Frame","children":[{"name":"  "}]},{"name":"Fork"}]}"#;
        let err = parse_children(content, Some(2)).unwrap_err();
        assert!(matches!(err, GenerateError::InvalidPayload(_)));
    }
}
