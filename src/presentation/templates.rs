use std::collections::HashSet;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::domains::presentation::PresentationBrief;
use crate::error::{RagDeskError, Result};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([A-Za-z_]+)\s*\}\}").expect("placeholder pattern"));

/// Prompt used to write one section of a deck.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionTemplate {
    pub key: String,
    pub title: String,
    pub prompt: String,
}

impl SectionTemplate {
    pub fn new(key: &str, title: &str, prompt: &str) -> Self {
        Self {
            key: key.to_string(),
            title: title.to_string(),
            prompt: prompt.to_string(),
        }
    }

    pub fn render(&self, brief: &PresentationBrief) -> String {
        render_prompt(&self.prompt, brief)
    }
}

pub fn default_templates() -> Vec<SectionTemplate> {
    vec![
        SectionTemplate::new(
            "executive_summary",
            "Executive Summary",
            "Write a concise executive summary of a proposal for {{client_name}}, a company in the {{industry}} industry. \
             They are struggling with: {{pain_points}}. They are interested in: {{interests}}.",
        ),
        SectionTemplate::new(
            "challenges",
            "Challenges",
            "List the key business challenges {{client_name}} faces in the {{industry}} industry, \
             starting from these pain points: {{pain_points}}. Use a bulleted list.",
        ),
        SectionTemplate::new(
            "solution",
            "Proposed Solution",
            "Describe a solution for {{client_name}} that addresses {{pain_points}} \
             and builds on their interest in {{interests}}.",
        ),
        SectionTemplate::new(
            "benefits",
            "Benefits",
            "List the concrete benefits {{client_name}} can expect, with measurable outcomes where possible. \
             Use a bulleted list.",
        ),
        SectionTemplate::new(
            "implementation",
            "Implementation Plan",
            "Outline a phased implementation plan for {{client_name}} in the {{industry}} industry. \
             Use a numbered list of phases.",
        ),
        SectionTemplate::new(
            "next_steps",
            "Next Steps",
            "Suggest clear next steps for {{client_name}} to move forward with the proposal. Use a bulleted list.",
        ),
    ]
}

/// Reads a JSON array of templates.
pub fn load_templates(path: impl AsRef<Path>) -> Result<Vec<SectionTemplate>> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .map_err(|e| RagDeskError::Config(format!("reading {}: {e}", path.display())))?;
    let templates: Vec<SectionTemplate> = serde_json::from_str(&raw)
        .map_err(|e| RagDeskError::Config(format!("parsing {}: {e}", path.display())))?;
    validate_templates(&templates)?;
    Ok(templates)
}

pub fn validate_templates(templates: &[SectionTemplate]) -> Result<()> {
    if templates.is_empty() {
        return Err(RagDeskError::Validation("at least one section template is required".to_string()));
    }
    let mut seen = HashSet::new();
    for template in templates {
        if template.key.trim().is_empty() || template.prompt.trim().is_empty() {
            return Err(RagDeskError::Validation(format!(
                "section template '{}' needs a key and a prompt",
                template.title
            )));
        }
        if !seen.insert(template.key.as_str()) {
            return Err(RagDeskError::Validation(format!(
                "duplicate section key '{}'",
                template.key
            )));
        }
    }
    Ok(())
}

/// Fills `{{name}}` placeholders from the brief. Unknown names stay as written.
pub fn render_prompt(template: &str, brief: &PresentationBrief) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            let value = match &caps[1] {
                "client_name" => brief.client_name.as_str(),
                "industry" => brief.industry.as_str(),
                "pain_points" => brief.pain_points.as_str(),
                "interests" => brief.interests.as_str(),
                _ => return caps[0].to_string(),
            };
            let value = value.trim();
            if value.is_empty() {
                "not specified".to_string()
            } else {
                value.to_string()
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brief() -> PresentationBrief {
        PresentationBrief {
            client_name: "Acme".to_string(),
            industry: "Logistics".to_string(),
            pain_points: "late deliveries".to_string(),
            interests: String::new(),
        }
    }

    #[test]
    fn substitutes_known_placeholders() {
        let out = render_prompt("{{client_name}} in {{ industry }}: {{pain_points}} / {{interests}}", &brief());
        assert_eq!(out, "Acme in Logistics: late deliveries / not specified");
    }

    #[test]
    fn leaves_unknown_placeholders() {
        assert_eq!(render_prompt("Hi {{budget}}", &brief()), "Hi {{budget}}");
    }

    #[test]
    fn default_set_is_valid() {
        let templates = default_templates();
        assert_eq!(templates.len(), 6);
        assert!(validate_templates(&templates).is_ok());
        let mut dup = templates.clone();
        dup.push(templates[0].clone());
        assert!(validate_templates(&dup).is_err());
        assert!(validate_templates(&[]).is_err());
    }
}
