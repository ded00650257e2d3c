//! Languages a newsletter can be written in

use crate::PromptError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported prompt languages
///
/// # Examples
///
/// ```
/// use crew_prompt::Language;
///
/// let lang: Language = "pt-BR".parse().unwrap();
/// assert_eq!(lang, Language::Portuguese);
/// assert_eq!(lang.code(), "pt");
/// assert!("ja".parse::<Language>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    English,
    /// Brazilian Portuguese, the language of the original prompts
    Portuguese,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::English, Language::Portuguese];

    /// ISO 639-1 code
    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Portuguese => "pt",
        }
    }

    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Portuguese => "Português",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Language {
    type Err = PromptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "en" | "en-us" | "en-gb" | "english" => Ok(Language::English),
            "pt" | "pt-br" | "pt-pt" | "portuguese" | "português" | "portugues" => {
                Ok(Language::Portuguese)
            }
            other => Err(PromptError::UnsupportedLanguage(other.to_string())),
        }
    }
}
