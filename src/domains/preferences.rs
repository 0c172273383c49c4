use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domains::chat::ChatMode;
use crate::error::{RagDeskError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::System => "system",
        };
        f.write_str(name)
    }
}

impl FromStr for Theme {
    type Err = RagDeskError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            "system" | "auto" => Ok(Theme::System),
            other => Err(RagDeskError::Validation(format!("unknown theme '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplaySettings {
    pub show_timestamps: bool,
    pub compact: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            show_timestamps: true,
            compact: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorPalette {
    pub primary: String,
    pub secondary: String,
    pub accent: String,
    pub background: String,
    pub text: String,
}

impl Default for ColorPalette {
    fn default() -> Self {
        Self {
            primary: "#1F4E79".to_string(),
            secondary: "#D9E2EC".to_string(),
            accent: "#F28C28".to_string(),
            background: "#FFFFFF".to_string(),
            text: "#222222".to_string(),
        }
    }
}

impl ColorPalette {
    /// Colour without the leading `#`, as Office XML wants it. A value that
    /// is not `#RRGGBB` comes out as black.
    pub fn hex(value: &str) -> &str {
        if is_hex_color(value) {
            &value[1..]
        } else {
            "000000"
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("primary", &self.primary),
            ("secondary", &self.secondary),
            ("accent", &self.accent),
            ("background", &self.background),
            ("text", &self.text),
        ] {
            if !is_hex_color(value) {
                return Err(RagDeskError::Validation(format!(
                    "palette colour '{name}' must be #RRGGBB, got '{value}'"
                )));
            }
        }
        Ok(())
    }
}

fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    #[serde(default)]
    pub theme: Theme,
    #[serde(default)]
    pub display: DisplaySettings,
    #[serde(default = "default_system_prompts")]
    pub default_system_prompts: BTreeMap<ChatMode, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_palette: Option<ColorPalette>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_chat_id: Option<String>,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            display: DisplaySettings::default(),
            default_system_prompts: default_system_prompts(),
            custom_palette: None,
            active_chat_id: None,
        }
    }
}

impl UserPreferences {
    /// The custom palette, or the built-in one.
    pub fn palette(&self) -> ColorPalette {
        self.custom_palette.clone().unwrap_or_default()
    }

    /// Drops a custom palette that fails validation and returns why.
    pub fn discard_invalid_palette(&mut self) -> Option<RagDeskError> {
        let err = self.custom_palette.as_ref()?.validate().err()?;
        self.custom_palette = None;
        Some(err)
    }

    pub fn system_prompt_for(&self, mode: ChatMode) -> Option<&str> {
        self.default_system_prompts
            .get(&mode)
            .map(String::as_str)
            .filter(|p| !p.trim().is_empty())
    }
}

pub fn default_system_prompts() -> BTreeMap<ChatMode, String> {
    let mut prompts = BTreeMap::new();
    prompts.insert(
        ChatMode::Chat,
        "You are a helpful assistant. Answer clearly and concisely.".to_string(),
    );
    prompts.insert(
        ChatMode::Rag,
        "You answer questions using only the provided context passages. \
         Cite passages by their number in square brackets. \
         If the context does not contain the answer, say so."
            .to_string(),
    );
    prompts.insert(
        ChatMode::Summarize,
        "Summarize the provided material faithfully, keeping key figures and decisions."
            .to_string(),
    );
    prompts.insert(ChatMode::Search, String::new());
    prompts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn palette(primary: &str) -> ColorPalette {
        ColorPalette {
            primary: primary.to_string(),
            secondary: "#112233".to_string(),
            accent: "#abcdef".to_string(),
            background: "#FFFFFF".to_string(),
            text: "#000000".to_string(),
        }
    }

    #[test]
    fn validates_palette_colours() {
        assert!(palette("#0a0B0c").validate().is_ok());
        assert!(palette("0a0b0c").validate().is_err());
        assert!(palette("#0a0b0").validate().is_err());
        assert!(palette("#zzzzzz").validate().is_err());
    }

    #[test]
    fn invalid_stored_palette_is_dropped() {
        let mut prefs = UserPreferences {
            custom_palette: Some(palette("red\"/><x y=\"")),
            ..Default::default()
        };
        assert!(prefs.discard_invalid_palette().is_some());
        assert_eq!(prefs.palette(), ColorPalette::default());
        assert!(prefs.discard_invalid_palette().is_none());

        assert_eq!(ColorPalette::hex("#1F4E79"), "1F4E79");
        assert_eq!(ColorPalette::hex("red\"/>"), "000000");
    }

    #[test]
    fn search_mode_has_no_default_prompt() {
        let prefs = UserPreferences::default();
        assert!(prefs.system_prompt_for(ChatMode::Search).is_none());
        assert!(prefs.system_prompt_for(ChatMode::Rag).is_some());
    }

    #[test]
    fn preferences_serialize_mode_keys_as_strings() {
        let prefs = UserPreferences::default();
        let value = serde_json::to_value(&prefs).unwrap();
        assert!(value["default_system_prompts"].get("rag").is_some());
        let back: UserPreferences = serde_json::from_value(value).unwrap();
        assert_eq!(back, prefs);

        let sparse: UserPreferences = serde_json::from_str("{\"theme\":\"dark\"}").unwrap();
        assert_eq!(sparse.theme, Theme::Dark);
        assert_eq!(sparse.default_system_prompts.len(), 4);
    }
}
