//! Blueprint rendering — turns a `PromptSpec` into the structured prompt text
//! that is sent to a model. Pure and deterministic.

use std::fmt::Write;

use crate::blueprint::spec::PromptSpec;

const DEFAULT_OUTPUT_TYPE: &str = "content";

fn section(out: &mut String, title: &str, body: &str) {
    let _ = write!(out, "## {title}\n{body}\n\n");
}

/// Renders `spec` as markdown-sectioned prompt text. Sections for audience,
/// context and type-specific guidance are omitted when empty.
pub fn render_blueprint(spec: &PromptSpec) -> String {
    let output_type = spec.output_type.as_deref().unwrap_or(DEFAULT_OUTPUT_TYPE);
    let settings = &spec.settings;
    let (min_words, max_words) = settings.length.word_range();

    let mut out = String::new();

    section(
        &mut out,
        "Role",
        &format!("You are an expert writer producing {output_type}."),
    );
    section(&mut out, "Task", spec.intent.trim());

    if let Some(audience) = spec.audience.as_deref() {
        section(&mut out, "Audience", audience);
    }
    if let Some(context) = spec.context.as_deref() {
        section(&mut out, "Context", context);
    }

    section(
        &mut out,
        "Tone",
        &format!("{}: {}.", settings.tone, settings.tone.guidance()),
    );
    section(&mut out, "Format", settings.format.instruction());
    section(
        &mut out,
        "Length",
        &format!("Aim for {min_words}-{max_words} words ({}).", settings.length),
    );

    if !spec.type_specific.is_empty() {
        let bullets = spec
            .type_specific
            .iter()
            .map(|item| format!("- {item}"))
            .collect::<Vec<_>>()
            .join("\n");
        section(&mut out, "Guidance", &bullets);
    }

    let _ = write!(out, "Respond with the {output_type} only.");
    out
}
