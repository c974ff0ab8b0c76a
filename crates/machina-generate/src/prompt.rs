//! Prompt construction for bill-of-materials decomposition.

use crate::GenerationRequest;

/// Number of children the default prompt asks for.
pub const DEFAULT_CHILD_COUNT: usize = 2;

pub fn system_prompt(request: &GenerationRequest) -> String {
    let level_hint = if request.ancestry.is_empty() {
        "This is the root component. Generate two major physical subassemblies \
         or critical components that would be at the top level of a BOM."
    } else {
        "Consider the full component hierarchy when determining the appropriate \
         level of subcomponents."
    };

    format!(
        r#"You are a manufacturing and engineering expert specializing in bill of materials (BOM) and physical component breakdowns.
Output only valid JSON matching the following structure:
{{
  "children": [
    {{ "name": "string (first physical subcomponent)", "children": [] }},
    {{ "name": "string (second physical subcomponent)", "children": [] }}
  ]
}}

Important guidelines:
- Focus ONLY on physical, tangible components or stock materials that would appear in a bill of materials
- Each component should be a real, manufacturable part, assembly, or stock material
- Use proper engineering/manufacturing terminology
- Consider standard part hierarchies (assembly, subassembly, component, part, stock material)
- Name components as they would appear in technical documentation
- Avoid abstract concepts, functions, or features
- Ensure new components complement existing ones and maintain logical assembly relationships
- Avoid duplicating existing components or their close variants

{level_hint}"#
    )
}

pub fn user_prompt(request: &GenerationRequest) -> String {
    let ancestry = if request.ancestry.is_empty() {
        String::new()
    } else {
        format!(
            " considering its position in the assembly hierarchy: {}",
            request.ancestry.join(" → ")
        )
    };

    let existing = if request.existing_children.is_empty() {
        String::new()
    } else {
        format!(
            "\nExisting children components: {}",
            request
                .existing_children
                .iter()
                .map(|name| format!("\"{name}\""))
                .collect::<Vec<_>>()
                .join(", ")
        )
    };

    format!(
        "Generate exactly two physical subcomponents or parts that would be direct \
         children in a bill of materials for \"{}\"{ancestry}.{existing}\n\
         These should be real, tangible parts that could be manufactured or sourced, \
         and should logically complement any existing components while avoiding duplication.",
        request.name
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> GenerationRequest {
        GenerationRequest {
            name: "Wheel Assembly".to_string(),
            ancestry: vec!["Bicycle".to_string(), "Drivetrain".to_string()],
            existing_children: vec!["Hub".to_string()],
        }
    }

    #[test]
    fn test_user_prompt_joins_ancestry_with_arrows() {
        let prompt = user_prompt(&request());
        assert!(prompt.contains("Bicycle → Drivetrain"));
        assert!(prompt.contains("\"Wheel Assembly\""));
    }

    #[test]
    fn test_user_prompt_quotes_existing_children() {
        let prompt = user_prompt(&request());
        assert!(prompt.contains("Existing children components: \"Hub\""));
    }

    #[test]
    fn test_root_request_omits_ancestry_clause() {
        let root = GenerationRequest {
            name: "Bicycle".to_string(),
            ..Default::default()
        };
        let prompt = user_prompt(&root);
        assert!(!prompt.contains("assembly hierarchy"));
        assert!(!prompt.contains("Existing children"));
        assert!(system_prompt(&root).contains("root component"));
    }
}
