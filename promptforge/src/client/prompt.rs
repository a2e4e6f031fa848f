//! Composition of the text block sent alongside the media parts.

/// Directive used when the accumulated context is empty.
pub const FALLBACK_DIRECTIVE: &str = "Analyze visual material.";

const OPERATIONAL_CONSTRAINTS: [&str; 4] = [
    "Use dense, technical terminology only.",
    "Analyze physics, optics, lighting, and material science.",
    "For video frames: Prioritize temporal shifts and motion persistence.",
    "Avoid conversational filler. Output the raw architectural data.",
];

/// Builds the prompt text for one stage request.
///
/// The accumulated context is embedded verbatim as the directive, followed
/// by the stage's role instructions and the fixed constraint list.
#[must_use]
pub fn compose_prompt(context: &str, instructions: &str) -> String {
    let directive = if context.trim().is_empty() {
        FALLBACK_DIRECTIVE
    } else {
        context
    };

    let mut prompt = String::with_capacity(directive.len() + instructions.len() + 512);
    prompt.push_str("--- NEURAL ARCHITECT PROTOCOL ---\n");
    prompt.push_str("Directive: ");
    prompt.push_str(directive);
    prompt.push_str("\n\n--- AGENT ASSIGNMENT ---\n");
    prompt.push_str(instructions.trim());
    prompt.push_str("\n\n--- OPERATIONAL CONSTRAINTS ---");
    for (i, constraint) in OPERATIONAL_CONSTRAINTS.iter().enumerate() {
        prompt.push_str(&format!("\n{}. {constraint}", i + 1));
    }
    prompt
}
