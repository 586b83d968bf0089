//! Instruction text for the refinement and composition stages.

pub const REFINEMENT: &str = include_str!("../data/prompts/refinement.txt");
pub const COMPOSITION_BASE: &str = include_str!("../data/prompts/composition.txt");

pub const STYLING_NOTES: &str = "Blend in the user-provided styling notes: {{notes}}.";
pub const CUSTOM_SCENE: &str = "Use the user uploaded background scene to ground the composition.";
pub const EDITORIAL_BACKDROP: &str =
    "Generate an elegant, high-fashion editorial backdrop that complements luxury jewelry.";
pub const POSE_HIGHLIGHTS: &str = "Mirror these pose highlights: {{notes}}.";
pub const TWO_FRAMINGS: &str = "Return two distinct framing options for user review.";

/// Replace `{{key}}` placeholders in a template string.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        result = result.replace(&format!("{{{{{}}}}}", key), value);
    }
    result
}

/// Structured inputs for [`build_generation_prompt`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompositionPromptOptions<'a> {
    pub product_type: &'a str,
    pub scene_prompt: Option<&'a str>,
    pub custom_scene: bool,
    pub guidance: Option<&'a str>,
    pub pose_notes: Option<&'a str>,
}

pub fn build_refinement_prompt(product_type: &str) -> String {
    render(REFINEMENT, &[("product_type", product_type)])
        .trim_end()
        .to_string()
}

/// Composition instruction, one clause per line.
///
/// Conditional clauses always appear in the same order: styling notes, scene
/// (uploaded or generated backdrop), lighting guidance, pose highlights.
pub fn build_generation_prompt(options: &CompositionPromptOptions<'_>) -> String {
    let mut lines: Vec<String> = render(
        COMPOSITION_BASE,
        &[("product_type", options.product_type)],
    )
    .lines()
    .map(str::to_string)
    .collect();

    if let Some(notes) = non_empty(options.scene_prompt) {
        lines.push(render(STYLING_NOTES, &[("notes", notes)]));
    }
    if options.custom_scene {
        lines.push(CUSTOM_SCENE.to_string());
    } else {
        lines.push(EDITORIAL_BACKDROP.to_string());
    }
    if let Some(guidance) = non_empty(options.guidance) {
        lines.push(guidance.to_string());
    }
    if let Some(notes) = non_empty(options.pose_notes) {
        lines.push(render(POSE_HIGHLIGHTS, &[("notes", notes)]));
    }
    lines.push(TWO_FRAMINGS.to_string());

    lines.join("\n")
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
