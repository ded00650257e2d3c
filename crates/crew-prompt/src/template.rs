//! Core prompt template trait

use crate::{Language, PromptError, Result};

/// A named prompt with one variant per language
///
/// Variables are passed as `serde_json::Value` so the trait stays
/// dyn-compatible.
pub trait PromptTemplate: Send + Sync {
    fn name(&self) -> &str;

    /// Languages with a variant, in a stable order
    fn languages(&self) -> Vec<Language>;

    fn supports_language(&self, lang: Language) -> bool {
        self.languages().contains(&lang)
    }

    /// Render the variant for `lang`
    ///
    /// Fails if the language has no variant or a variable is undefined.
    fn render(&self, lang: Language, vars: &serde_json::Value) -> Result<String>;

    /// Render `lang`, falling back to English, then to any available variant
    fn render_with_fallback(&self, lang: Language, vars: &serde_json::Value) -> Result<String> {
        if self.supports_language(lang) {
            return self.render(lang, vars);
        }
        if self.supports_language(Language::English) {
            return self.render(Language::English, vars);
        }

        let fallback = self
            .languages()
            .into_iter()
            .next()
            .ok_or_else(|| PromptError::NoTemplatesProvided(self.name().to_string()))?;
        self.render(fallback, vars)
    }

    /// Raw template source, for inspection
    fn raw_template(&self, lang: Language) -> Option<&str>;
}
