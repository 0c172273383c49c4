//! Sales presentation generation and export.
//!
//! [`PresentationGenerator`] turns a [`PresentationBrief`] into written
//! sections and slides; [`render_html`] and [`write_pptx`] export the result.
//!
//! [`PresentationBrief`]: crate::domains::presentation::PresentationBrief

pub mod generator;
pub mod html;
pub mod pptx;
pub mod templates;

pub use generator::{PresentationGenerator, DEFAULT_SYSTEM_PROMPT, MAX_BULLETS};
pub use html::render_html;
pub use pptx::{write_pptx, write_pptx_file};
pub use templates::{default_templates, load_templates, SectionTemplate};
