//! MiniJinja-backed templates
//!
//! Templates use Jinja2 syntax (`{{ ticket }}`, `{% if ... %}`). Undefined
//! variables are an error rather than an empty string, so a profile that
//! references a key the step does not provide fails loudly.

use crate::{Language, PromptError, PromptTemplate, Result};
use minijinja::{Environment, UndefinedBehavior};
use std::collections::BTreeMap;

/// A prompt template backed by MiniJinja
///
/// ```
/// use crew_prompt::{JinjaTemplate, Language, PromptTemplate};
/// use serde_json::json;
///
/// let template = JinjaTemplate::builder("task")
///     .english("Analyze {{ ticket }}")
///     .portuguese("Analise {{ ticket }}")
///     .build()
///     .unwrap();
///
/// let pt = template.render(Language::Portuguese, &json!({ "ticket": "PETR4.SA" })).unwrap();
/// assert_eq!(pt, "Analise PETR4.SA");
/// ```
#[derive(Clone)]
pub struct JinjaTemplate {
    name: String,
    templates: BTreeMap<Language, String>,
}

impl JinjaTemplate {
    pub fn builder(name: impl Into<String>) -> JinjaTemplateBuilder {
        JinjaTemplateBuilder::new(name)
    }

    /// English-only template
    pub fn new(name: impl Into<String>, template: impl Into<String>) -> Result<Self> {
        Self::builder(name).english(template).build()
    }

    /// English and Portuguese variants
    pub fn bilingual(
        name: impl Into<String>,
        english: impl Into<String>,
        portuguese: impl Into<String>,
    ) -> Result<Self> {
        Self::builder(name).english(english).portuguese(portuguese).build()
    }

    fn environment() -> Environment<'static> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env
    }
}

impl PromptTemplate for JinjaTemplate {
    fn name(&self) -> &str {
        &self.name
    }

    fn languages(&self) -> Vec<Language> {
        self.templates.keys().copied().collect()
    }

    fn render(&self, lang: Language, vars: &serde_json::Value) -> Result<String> {
        let source = self
            .templates
            .get(&lang)
            .ok_or_else(|| PromptError::TemplateNotFound {
                name: self.name.clone(),
                language: lang.code().to_string(),
            })?;

        let env = Self::environment();
        env.render_str(source, minijinja::Value::from_serialize(vars))
            .map(|s| s.trim().to_string())
            .map_err(|e| PromptError::RenderError {
                name: self.name.clone(),
                detail: e.to_string(),
            })
    }

    fn raw_template(&self, lang: Language) -> Option<&str> {
        self.templates.get(&lang).map(String::as_str)
    }
}

impl std::fmt::Debug for JinjaTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JinjaTemplate")
            .field("name", &self.name)
            .field("languages", &self.templates.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Builder for [`JinjaTemplate`]
pub struct JinjaTemplateBuilder {
    name: String,
    templates: BTreeMap<Language, String>,
}

impl JinjaTemplateBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            templates: BTreeMap::new(),
        }
    }

    /// Add a variant for a specific language
    pub fn template(mut self, lang: Language, content: impl Into<String>) -> Self {
        self.templates.insert(lang, content.into());
        self
    }

    pub fn english(self, content: impl Into<String>) -> Self {
        self.template(Language::English, content)
    }

    pub fn portuguese(self, content: impl Into<String>) -> Self {
        self.template(Language::Portuguese, content)
    }

    /// Build the template, checking that every variant parses
    pub fn build(self) -> Result<JinjaTemplate> {
        if self.templates.is_empty() {
            return Err(PromptError::NoTemplatesProvided(self.name));
        }

        let env = JinjaTemplate::environment();
        for (lang, content) in &self.templates {
            env.template_from_str(content)
                .map_err(|e| PromptError::TemplateParseFailed {
                    name: self.name.clone(),
                    language: lang.code().to_string(),
                    detail: e.to_string(),
                })?;
        }

        Ok(JinjaTemplate {
            name: self.name,
            templates: self.templates,
        })
    }
}
