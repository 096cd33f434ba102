//! PromptSpec — the immutable configuration a blueprint is rendered from.
//!
//! Precedence when building a spec: explicit caller override, then the
//! model's inferred value, then the vocabulary default. Inferred values that
//! are blank or outside the vocabulary are ignored, never errors.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::blueprint::vocab::{Format, Length, Tone};

const MAX_TYPE_SPECIFIC: usize = 8;
pub const DEFAULT_REASONING: &str = "Defaults applied; no analysis was available.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferredSettings {
    pub tone: Tone,
    pub format: Format,
    pub length: Length,
    pub reasoning: String,
}

impl Default for InferredSettings {
    fn default() -> Self {
        Self {
            tone: Tone::default(),
            format: Format::default(),
            length: Length::default(),
            reasoning: DEFAULT_REASONING.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptSpec {
    pub intent: String,
    pub audience: Option<String>,
    pub context: Option<String>,
    /// What is being produced, e.g. "blog post", "cover letter".
    pub output_type: Option<String>,
    pub settings: InferredSettings,
    /// Extra guidance specific to the output type.
    #[serde(default)]
    pub type_specific: Vec<String>,
}

/// Analysis payload as the model returns it. Everything optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InferredSpec {
    pub tone: Option<String>,
    pub format: Option<String>,
    pub length: Option<String>,
    pub reasoning: Option<String>,
    pub audience: Option<String>,
    pub output_type: Option<String>,
    #[serde(default)]
    pub type_specific: Vec<String>,
}

impl InferredSpec {
    /// True when at least one of tone, format or length is non-blank.
    pub fn has_settings(&self) -> bool {
        [&self.tone, &self.format, &self.length]
            .iter()
            .any(|value| non_blank(value.as_deref()).is_some())
    }
}

/// Caller input for a new spec.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpecDraft {
    pub intent: String,
    pub audience: Option<String>,
    pub context: Option<String>,
    pub output_type: Option<String>,
    pub tone: Option<Tone>,
    pub format: Option<Format>,
    pub length: Option<Length>,
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_or<T: std::str::FromStr<Err = String> + Copy>(raw: Option<&str>, fallback: T) -> T {
    match non_blank(raw) {
        Some(v) => v.parse::<T>().unwrap_or_else(|e| {
            debug!("Ignoring inferred value: {e}");
            fallback
        }),
        None => fallback,
    }
}

impl PromptSpec {
    /// A spec carrying only the draft's own fields and vocabulary defaults.
    pub fn from_draft(draft: &SpecDraft) -> Self {
        Self {
            intent: draft.intent.trim().to_string(),
            audience: non_blank(draft.audience.as_deref()),
            context: non_blank(draft.context.as_deref()),
            output_type: non_blank(draft.output_type.as_deref()),
            settings: InferredSettings::default(),
            type_specific: Vec::new(),
        }
    }

    /// Layers inferred values over `self`. Present, non-blank, in-vocabulary
    /// inferred fields win; everything else keeps the current value.
    pub fn merge(&self, inferred: &InferredSpec) -> Self {
        let mut type_specific: Vec<String> = Vec::new();
        for item in inferred.type_specific.iter().chain(self.type_specific.iter()) {
            let item = item.trim();
            if !item.is_empty() && !type_specific.iter().any(|t| t.eq_ignore_ascii_case(item)) {
                type_specific.push(item.to_string());
            }
        }
        type_specific.truncate(MAX_TYPE_SPECIFIC);

        Self {
            intent: self.intent.clone(),
            audience: non_blank(inferred.audience.as_deref()).or_else(|| self.audience.clone()),
            context: self.context.clone(),
            output_type: non_blank(inferred.output_type.as_deref())
                .or_else(|| self.output_type.clone()),
            settings: InferredSettings {
                tone: parse_or(inferred.tone.as_deref(), self.settings.tone),
                format: parse_or(inferred.format.as_deref(), self.settings.format),
                length: parse_or(inferred.length.as_deref(), self.settings.length),
                reasoning: non_blank(inferred.reasoning.as_deref())
                    .unwrap_or_else(|| self.settings.reasoning.clone()),
            },
            type_specific,
        }
    }

    /// Same spec with the style triple replaced; used per matrix cell.
    pub fn with_style(&self, tone: Tone, length: Length, format: Format) -> Self {
        let mut spec = self.clone();
        spec.settings.tone = tone;
        spec.settings.length = length;
        spec.settings.format = format;
        spec
    }
}

/// Builds the final spec: draft fields, merged with inference (if any),
/// then explicit draft overrides for tone / format / length / audience.
pub fn build_spec(draft: &SpecDraft, inferred: Option<&InferredSpec>) -> PromptSpec {
    let base = PromptSpec::from_draft(draft);
    let mut spec = match inferred {
        Some(inferred) => base.merge(inferred),
        None => base,
    };

    if let Some(tone) = draft.tone {
        spec.settings.tone = tone;
    }
    if let Some(format) = draft.format {
        spec.settings.format = format;
    }
    if let Some(length) = draft.length {
        spec.settings.length = length;
    }
    if let Some(audience) = non_blank(draft.audience.as_deref()) {
        spec.audience = Some(audience);
    }
    if let Some(output_type) = non_blank(draft.output_type.as_deref()) {
        spec.output_type = Some(output_type);
    }
    spec
}
