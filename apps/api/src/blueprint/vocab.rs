//! Tone, format and length vocabularies shared by specs, blueprints and the
//! experiment matrix. Identifiers serialize as snake_case.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lowercases and maps spaces/hyphens to underscores so model output like
/// "Bullet Points" or "step-by-step" parses.
fn normalize(raw: &str) -> String {
    raw.trim()
        .to_ascii_lowercase()
        .replace(|c: char| c == ' ' || c == '-', "_")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    #[default]
    Professional,
    Casual,
    Friendly,
    Formal,
    Persuasive,
    Technical,
    Creative,
    Empathetic,
}

impl Tone {
    pub const ALL: [Tone; 8] = [
        Tone::Professional,
        Tone::Casual,
        Tone::Friendly,
        Tone::Formal,
        Tone::Persuasive,
        Tone::Technical,
        Tone::Creative,
        Tone::Empathetic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Professional => "professional",
            Tone::Casual => "casual",
            Tone::Friendly => "friendly",
            Tone::Formal => "formal",
            Tone::Persuasive => "persuasive",
            Tone::Technical => "technical",
            Tone::Creative => "creative",
            Tone::Empathetic => "empathetic",
        }
    }

    pub fn guidance(&self) -> &'static str {
        match self {
            Tone::Professional => "clear, confident and businesslike",
            Tone::Casual => "relaxed and conversational, contractions welcome",
            Tone::Friendly => "warm and approachable without losing substance",
            Tone::Formal => "precise and impersonal, no contractions or slang",
            Tone::Persuasive => "benefit-led, with a clear call to action",
            Tone::Technical => "exact terminology, assumes domain knowledge",
            Tone::Creative => "vivid and original, unexpected angles encouraged",
            Tone::Empathetic => "acknowledges the reader's situation and feelings first",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    #[default]
    Paragraph,
    BulletPoints,
    NumberedList,
    Table,
    Json,
    Markdown,
    Email,
    StepByStep,
}

impl Format {
    pub const ALL: [Format; 8] = [
        Format::Paragraph,
        Format::BulletPoints,
        Format::NumberedList,
        Format::Table,
        Format::Json,
        Format::Markdown,
        Format::Email,
        Format::StepByStep,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Paragraph => "paragraph",
            Format::BulletPoints => "bullet_points",
            Format::NumberedList => "numbered_list",
            Format::Table => "table",
            Format::Json => "json",
            Format::Markdown => "markdown",
            Format::Email => "email",
            Format::StepByStep => "step_by_step",
        }
    }

    pub fn instruction(&self) -> &'static str {
        match self {
            Format::Paragraph => "Write in flowing prose paragraphs.",
            Format::BulletPoints => "Use concise bullet points, one idea per bullet.",
            Format::NumberedList => "Use a numbered list in a logical order.",
            Format::Table => "Present the answer as a markdown table with a header row.",
            Format::Json => "Return a single valid JSON object and nothing else.",
            Format::Markdown => "Use markdown headings and emphasis to structure the answer.",
            Format::Email => "Write a complete email with subject line, greeting and sign-off.",
            Format::StepByStep => "Break the answer into explicit sequential steps.",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Length {
    Brief,
    Short,
    #[default]
    Medium,
    Long,
    Comprehensive,
}

impl Length {
    pub const ALL: [Length; 5] = [
        Length::Brief,
        Length::Short,
        Length::Medium,
        Length::Long,
        Length::Comprehensive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Length::Brief => "brief",
            Length::Short => "short",
            Length::Medium => "medium",
            Length::Long => "long",
            Length::Comprehensive => "comprehensive",
        }
    }

    /// Target word range (inclusive).
    pub fn word_range(&self) -> (u32, u32) {
        match self {
            Length::Brief => (10, 50),
            Length::Short => (50, 150),
            Length::Medium => (150, 400),
            Length::Long => (400, 800),
            Length::Comprehensive => (800, 2000),
        }
    }
}

macro_rules! vocab_traits {
    ($ty:ident) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = normalize(s);
                $ty::ALL
                    .into_iter()
                    .find(|v| v.as_str() == wanted)
                    .ok_or_else(|| format!("unknown {} '{}'", stringify!($ty).to_lowercase(), s.trim()))
            }
        }
    };
}

vocab_traits!(Tone);
vocab_traits!(Format);
vocab_traits!(Length);
