use pulldown_cmark::{html, Event, Options, Parser};
use pulldown_cmark_escape::escape_html;

use crate::domains::preferences::ColorPalette;
use crate::domains::presentation::PresentationData;
use crate::error::{RagDeskError, Result};

fn markdown_to_html(input: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    // Raw HTML in generated text is shown, not rendered.
    let parser = Parser::new_ext(input, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });
    let mut output = String::new();
    html::push_html(&mut output, parser);
    output
}

fn escaped(text: &str) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    escape_html(&mut out, text).map_err(|e| RagDeskError::Export(e.to_string()))?;
    Ok(out)
}

/// Renders the deck as a standalone HTML page, one `<section>` per generated section.
pub fn render_html(data: &PresentationData, palette: &ColorPalette) -> Result<String> {
    palette.validate()?;
    let title = escaped(&data.title())?;
    let client = escaped(data.brief.client_name.trim())?;
    let industry = escaped(data.brief.industry.trim())?;

    let mut body = String::new();
    for section in &data.sections {
        body.push_str(&format!(
            "<section id=\"{}\">\n<h2>{}</h2>\n{}</section>\n",
            escaped(&section.key)?,
            escaped(&section.title)?,
            markdown_to_html(&section.content)
        ));
    }

    Ok(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body {{ font-family: Helvetica, Arial, sans-serif; margin: 0; background: {background}; color: {text}; }}
header {{ background: {primary}; color: #FFFFFF; padding: 48px 64px; }}
header h1 {{ margin: 0 0 8px 0; }}
section {{ padding: 24px 64px; border-bottom: 1px solid {secondary}; }}
section h2 {{ color: {primary}; }}
li::marker {{ color: {accent}; }}
</style>
</head>
<body>
<header>
<h1>{client}</h1>
<p>Proposal for the {industry} industry</p>
</header>
{body}</body>
</html>
"#,
        background = palette.background,
        text = palette.text,
        primary = palette.primary,
        secondary = palette.secondary,
        accent = palette.accent,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::presentation::{GeneratedSection, PresentationBrief};

    #[test]
    fn escapes_brief_and_renders_markdown() {
        let data = PresentationData {
            brief: PresentationBrief {
                client_name: "Smith & <Sons>".to_string(),
                industry: "Retail".to_string(),
                ..Default::default()
            },
            sections: vec![GeneratedSection {
                key: "benefits".to_string(),
                title: "Benefits".to_string(),
                content: "- **fast**\n- cheap\n\nIntro <script>alert(1)</script>\n\n<div onclick=\"x()\">block</div>".to_string(),
                fallback: false,
            }],
            slides: Vec::new(),
        };
        let html = render_html(&data, &ColorPalette::default()).unwrap();
        assert!(html.contains("<h1>Smith &amp; &lt;Sons&gt;</h1>"));
        assert!(html.contains("<li><strong>fast</strong></li>"));
        assert!(html.contains("<section id=\"benefits\">"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(!html.contains("<div onclick"));
    }
}
