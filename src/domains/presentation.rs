use serde::{Deserialize, Serialize};

/// What the user types into the presentation wizard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PresentationBrief {
    pub client_name: String,
    pub industry: String,
    #[serde(default)]
    pub pain_points: String,
    #[serde(default)]
    pub interests: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedSection {
    pub key: String,
    pub title: String,
    pub content: String,
    /// Set when generation failed and placeholder text was used.
    #[serde(default)]
    pub fallback: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlideKind {
    Title,
    Content,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slide {
    pub kind: SlideKind,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub bullets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresentationData {
    pub brief: PresentationBrief,
    pub sections: Vec<GeneratedSection>,
    pub slides: Vec<Slide>,
}

impl PresentationData {
    pub fn section(&self, key: &str) -> Option<&GeneratedSection> {
        self.sections.iter().find(|s| s.key == key)
    }

    pub fn title(&self) -> String {
        format!("{} - Proposal", self.brief.client_name.trim())
    }
}
