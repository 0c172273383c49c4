use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domains::presentation::{
    GeneratedSection, PresentationBrief, PresentationData, Slide, SlideKind,
};
use crate::error::{RagDeskError, Result};
use crate::interfaces::providers::LlmProvider;
use crate::presentation::templates::{default_templates, validate_templates, SectionTemplate};
use crate::services::notifications::Notifier;

pub const MAX_BULLETS: usize = 6;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an experienced B2B sales consultant. \
Write clear, persuasive presentation content in plain markdown. \
Keep each section short enough to fit on a single slide.";

static LIST_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:[-*+•]|\d+[.)])\s+(.+)$").expect("list item pattern"));

pub struct PresentationGenerator {
    llm: Arc<dyn LlmProvider>,
    templates: Vec<SectionTemplate>,
    system_prompt: String,
    notifier: Notifier,
}

impl PresentationGenerator {
    pub fn new(llm: Arc<dyn LlmProvider>, notifier: Notifier) -> Self {
        Self {
            llm,
            templates: default_templates(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            notifier,
        }
    }

    pub fn with_templates(mut self, templates: Vec<SectionTemplate>) -> Result<Self> {
        validate_templates(&templates)?;
        self.templates = templates;
        Ok(self)
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn templates(&self) -> &[SectionTemplate] {
        &self.templates
    }

    /// Writes every section, substituting fallback text for the ones that fail.
    pub async fn generate(&self, brief: &PresentationBrief) -> Result<PresentationData> {
        validate_brief(brief)?;
        let mut sections = Vec::with_capacity(self.templates.len());
        for template in &self.templates {
            sections.push(self.generate_section(template, brief).await);
        }
        let failed = sections.iter().filter(|s| s.fallback).count();
        tracing::info!(
            client = %brief.client_name,
            sections = sections.len(),
            failed,
            "presentation generated"
        );
        let slides = derive_slides(brief, &sections);
        Ok(PresentationData {
            brief: brief.clone(),
            sections,
            slides,
        })
    }

    pub async fn regenerate_section(&self, data: &mut PresentationData, key: &str) -> Result<()> {
        let template = self
            .templates
            .iter()
            .find(|t| t.key == key)
            .ok_or_else(|| RagDeskError::NotFound(format!("section {key}")))?;
        let section = self.generate_section(template, &data.brief).await;
        match data.sections.iter_mut().find(|s| s.key == key) {
            Some(existing) => *existing = section,
            None => data.sections.push(section),
        }
        data.slides = derive_slides(&data.brief, &data.sections);
        Ok(())
    }

    async fn generate_section(&self, template: &SectionTemplate, brief: &PresentationBrief) -> GeneratedSection {
        let prompt = template.render(brief);
        let outcome = match self.llm.generate_text(&prompt, &self.system_prompt).await {
            Ok(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
            Ok(_) => Err(RagDeskError::Runtime("empty response".to_string())),
            Err(err) => Err(err),
        };
        match outcome {
            Ok(content) => GeneratedSection {
                key: template.key.clone(),
                title: template.title.clone(),
                content,
                fallback: false,
            },
            Err(err) => {
                tracing::warn!(section = %template.key, error = %err, "section generation failed");
                self.notifier
                    .warn(format!("Could not generate '{}', using placeholder text", template.title));
                GeneratedSection {
                    key: template.key.clone(),
                    title: template.title.clone(),
                    content: fallback_text(&template.title, brief),
                    fallback: true,
                }
            }
        }
    }
}

fn validate_brief(brief: &PresentationBrief) -> Result<()> {
    if brief.client_name.trim().is_empty() {
        return Err(RagDeskError::Validation("client name is required".to_string()));
    }
    if brief.industry.trim().is_empty() {
        return Err(RagDeskError::Validation("industry is required".to_string()));
    }
    Ok(())
}

pub fn fallback_text(title: &str, brief: &PresentationBrief) -> String {
    format!(
        "{title} for {} will be tailored to the {} industry. Content for this section could not be generated automatically.",
        brief.client_name.trim(),
        brief.industry.trim()
    )
}

pub fn derive_slides(brief: &PresentationBrief, sections: &[GeneratedSection]) -> Vec<Slide> {
    let mut slides = Vec::with_capacity(sections.len() + 1);
    slides.push(Slide {
        kind: SlideKind::Title,
        title: brief.client_name.trim().to_string(),
        subtitle: Some(format!("Proposal for the {} industry", brief.industry.trim())),
        bullets: Vec::new(),
    });
    slides.extend(sections.iter().map(|section| Slide {
        kind: SlideKind::Content,
        title: section.title.clone(),
        subtitle: None,
        bullets: bullets_from(&section.content),
    }));
    slides
}

/// List items if the text has any, otherwise its sentences. Capped at [`MAX_BULLETS`].
pub fn bullets_from(content: &str) -> Vec<String> {
    let items: Vec<String> = content
        .lines()
        .filter_map(|line| LIST_ITEM.captures(line))
        .map(|caps| clean_inline(&caps[1]))
        .filter(|item| !item.is_empty())
        .take(MAX_BULLETS)
        .collect();
    if !items.is_empty() {
        return items;
    }

    let prose = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect::<Vec<_>>()
        .join(" ");
    split_sentences(&prose)
        .into_iter()
        .map(|s| clean_inline(&s))
        .filter(|s| !s.is_empty())
        .take(MAX_BULLETS)
        .collect()
}

fn split_sentences(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        current.push(c);
        let at_boundary = matches!(c, '.' | '!' | '?')
            && chars.peek().map_or(true, |next| next.is_whitespace());
        if at_boundary {
            out.push(current.trim().to_string());
            current.clear();
        }
    }
    if !current.trim().is_empty() {
        out.push(current.trim().to_string());
    }
    out
}

fn clean_inline(text: &str) -> String {
    text.replace("**", "").replace("__", "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bullets_prefer_list_items() {
        let content = "Intro line.\n- **Faster** routing\n* Lower cost\n3. Better visibility\n";
        assert_eq!(
            bullets_from(content),
            vec!["Faster routing", "Lower cost", "Better visibility"]
        );
    }

    #[test]
    fn bullets_fall_back_to_sentences() {
        let content = "## Summary\nWe cut costs. Deliveries arrive on time! Version 2.0 ships soon";
        assert_eq!(
            bullets_from(content),
            vec!["We cut costs.", "Deliveries arrive on time!", "Version 2.0 ships soon"]
        );
    }

    #[test]
    fn bullets_are_capped() {
        let content = (1..=9).map(|i| format!("- item {i}")).collect::<Vec<_>>().join("\n");
        assert_eq!(bullets_from(&content).len(), MAX_BULLETS);
    }

    #[test]
    fn title_slide_comes_first() {
        let brief = PresentationBrief {
            client_name: "Acme".to_string(),
            industry: "Retail".to_string(),
            ..Default::default()
        };
        let sections = vec![GeneratedSection {
            key: "benefits".to_string(),
            title: "Benefits".to_string(),
            content: "- one".to_string(),
            fallback: false,
        }];
        let slides = derive_slides(&brief, &sections);
        assert_eq!(slides.len(), 2);
        assert_eq!(slides[0].kind, SlideKind::Title);
        assert_eq!(slides[0].subtitle.as_deref(), Some("Proposal for the Retail industry"));
        assert_eq!(slides[1].bullets, vec!["one"]);
    }
}
