//! Agent profiles
//!
//! A profile is the immutable persona and assignment of one pipeline step:
//! who the agent is (`role`, `goal`, `backstory`) and what it must deliver
//! (`task`, `expected_output`). Every field is a Jinja template rendered
//! against the step's input snapshot, so `{{ ticket }}` and
//! `{{ current_date }}` are filled in per run.

use crate::{JinjaTemplate, Language, PromptError, PromptTemplate, Result};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::LazyLock;

const SYSTEM_FRAME_EN: &str = "\
You are {{ role }}.
{{ backstory }}

Your personal goal is: {{ goal }}";

const SYSTEM_FRAME_PT: &str = "\
Você é {{ role }}.
{{ backstory }}

Seu objetivo pessoal é: {{ goal }}";

const TASK_FRAME_EN: &str = "\
Current task: {{ task }}
{% if context %}
Context from previous tasks:
{% for item in context %}
## {{ item.key }}
{{ item.value }}
{% endfor %}{% endif %}
This is the expected criteria for your final answer: {{ expected_output }}
You MUST return the actual complete content as the final answer, not a summary.";

const TASK_FRAME_PT: &str = "\
Tarefa atual: {{ task }}
{% if context %}
Contexto das tarefas anteriores:
{% for item in context %}
## {{ item.key }}
{{ item.value }}
{% endfor %}{% endif %}
Este é o critério esperado para a sua resposta final: {{ expected_output }}
Você DEVE retornar o conteúdo completo como resposta final, não um resumo.";

static SYSTEM_FRAME: LazyLock<Result<JinjaTemplate>> =
    LazyLock::new(|| JinjaTemplate::bilingual("system_frame", SYSTEM_FRAME_EN, SYSTEM_FRAME_PT));

static TASK_FRAME: LazyLock<Result<JinjaTemplate>> =
    LazyLock::new(|| JinjaTemplate::bilingual("task_frame", TASK_FRAME_EN, TASK_FRAME_PT));

fn frame(template: &'static LazyLock<Result<JinjaTemplate>>) -> Result<&'static JinjaTemplate> {
    template.as_ref().map_err(Clone::clone)
}

/// Raw profile text for one language
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileText {
    pub role: String,
    pub goal: String,
    pub backstory: String,
    pub task: String,
    pub expected_output: String,
}

impl ProfileText {
    fn fields(&self) -> [(&'static str, &str); 5] {
        [
            ("role", self.role.as_str()),
            ("goal", self.goal.as_str()),
            ("backstory", self.backstory.as_str()),
            ("task", self.task.as_str()),
            ("expected_output", self.expected_output.as_str()),
        ]
    }
}

/// Validated, template-compiled profile
#[derive(Debug, Clone)]
pub struct AgentProfile {
    name: String,
    role: JinjaTemplate,
    goal: JinjaTemplate,
    backstory: JinjaTemplate,
    task: JinjaTemplate,
    expected_output: JinjaTemplate,
}

impl AgentProfile {
    pub fn builder(name: impl Into<String>) -> AgentProfileBuilder {
        AgentProfileBuilder {
            name: name.into(),
            variants: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn languages(&self) -> Vec<Language> {
        self.role.languages()
    }

    /// Render every field for `lang` (falling back to English)
    pub fn render(&self, lang: Language, vars: &serde_json::Value) -> Result<RenderedProfile> {
        let language = if self.role.supports_language(lang) {
            lang
        } else {
            Language::English
        };

        Ok(RenderedProfile {
            language,
            role: self.role.render_with_fallback(lang, vars)?,
            goal: self.goal.render_with_fallback(lang, vars)?,
            backstory: self.backstory.render_with_fallback(lang, vars)?,
            task: self.task.render_with_fallback(lang, vars)?,
            expected_output: self.expected_output.render_with_fallback(lang, vars)?,
        })
    }
}

/// Builder for [`AgentProfile`]
#[derive(Debug, Clone)]
pub struct AgentProfileBuilder {
    name: String,
    variants: BTreeMap<Language, ProfileText>,
}

impl AgentProfileBuilder {
    /// Add the text for one language
    pub fn variant(mut self, lang: Language, text: ProfileText) -> Self {
        self.variants.insert(lang, text);
        self
    }

    /// Validate and compile every field
    ///
    /// Fails if no variant was given, a field is blank, or a template does
    /// not parse.
    pub fn build(self) -> Result<AgentProfile> {
        if self.variants.is_empty() {
            return Err(PromptError::NoTemplatesProvided(self.name));
        }

        for text in self.variants.values() {
            if let Some((field, _)) = text.fields().into_iter().find(|(_, v)| v.trim().is_empty()) {
                return Err(PromptError::EmptyField {
                    profile: self.name.clone(),
                    field: field.to_string(),
                });
            }
        }

        Ok(AgentProfile {
            role: self.compile("role", |t| &t.role)?,
            goal: self.compile("goal", |t| &t.goal)?,
            backstory: self.compile("backstory", |t| &t.backstory)?,
            task: self.compile("task", |t| &t.task)?,
            expected_output: self.compile("expected_output", |t| &t.expected_output)?,
            name: self.name,
        })
    }

    fn compile(&self, field: &str, pick: fn(&ProfileText) -> &String) -> Result<JinjaTemplate> {
        let mut builder = JinjaTemplate::builder(format!("{}.{field}", self.name));
        for (lang, text) in &self.variants {
            builder = builder.template(*lang, pick(text).clone());
        }
        builder.build()
    }
}

/// A profile with all variables substituted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedProfile {
    pub language: Language,
    pub role: String,
    pub goal: String,
    pub backstory: String,
    pub task: String,
    pub expected_output: String,
}

impl RenderedProfile {
    /// Persona prompt sent as the system message
    pub fn system_prompt(&self) -> Result<String> {
        frame(&SYSTEM_FRAME)?.render(
            self.language,
            &json!({
                "role": self.role,
                "goal": self.goal,
                "backstory": self.backstory,
            }),
        )
    }

    /// Assignment prompt sent as the first user message
    ///
    /// `context` holds upstream outputs as `(key, text)` pairs, in order.
    pub fn task_prompt(&self, context: &[(String, String)]) -> Result<String> {
        let context: Vec<_> = context
            .iter()
            .map(|(key, value)| json!({ "key": key, "value": value }))
            .collect();

        frame(&TASK_FRAME)?.render(
            self.language,
            &json!({
                "task": self.task,
                "expected_output": self.expected_output,
                "context": context,
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(role: &str) -> ProfileText {
        ProfileText {
            role: role.to_string(),
            goal: "Find the price of {{ ticket }}".to_string(),
            backstory: "Seasoned analyst.".to_string(),
            task: "Analyze {{ ticket }} as of {{ current_date }}".to_string(),
            expected_output: "UP, DOWN or SIDEWAYS".to_string(),
        }
    }

    fn vars() -> serde_json::Value {
        json!({ "ticket": "AAPL", "current_date": "2024-08-08" })
    }

    #[test]
    fn test_render_profile() {
        let profile = AgentProfile::builder("price_analyst")
            .variant(Language::English, text("Stock Analyst"))
            .build()
            .unwrap();

        let rendered = profile.render(Language::English, &vars()).unwrap();
        assert_eq!(rendered.goal, "Find the price of AAPL");
        assert_eq!(rendered.task, "Analyze AAPL as of 2024-08-08");
    }

    #[test]
    fn test_portuguese_falls_back_to_english() {
        let profile = AgentProfile::builder("price_analyst")
            .variant(Language::English, text("Stock Analyst"))
            .build()
            .unwrap();

        let rendered = profile.render(Language::Portuguese, &vars()).unwrap();
        assert_eq!(rendered.language, Language::English);
        assert_eq!(rendered.role, "Stock Analyst");
    }

    #[test]
    fn test_blank_field_rejected() {
        let mut blank = text("Stock Analyst");
        blank.backstory = "  ".to_string();

        let err = AgentProfile::builder("price_analyst")
            .variant(Language::English, blank)
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            PromptError::EmptyField {
                profile: "price_analyst".into(),
                field: "backstory".into()
            }
        );

        assert!(AgentProfile::builder("nothing").build().is_err());
    }

    #[test]
    fn test_system_and_task_prompts() {
        let profile = AgentProfile::builder("writer")
            .variant(Language::English, text("Senior Writer"))
            .variant(Language::Portuguese, text("Redator Sênior"))
            .build()
            .unwrap();

        let rendered = profile.render(Language::Portuguese, &vars()).unwrap();
        let system = rendered.system_prompt().unwrap();
        assert!(system.starts_with("Você é Redator Sênior."));
        assert!(system.contains("Seu objetivo pessoal é: Find the price of AAPL"));

        let task = rendered
            .task_prompt(&[("price_trend".to_string(), "AAPL, price UP".to_string())])
            .unwrap();
        assert!(task.contains("Contexto das tarefas anteriores"));
        assert!(task.contains("## price_trend\nAAPL, price UP"));

        let english = profile.render(Language::English, &vars()).unwrap();
        let task = english.task_prompt(&[]).unwrap();
        assert!(!task.contains("Context from previous tasks"));
        assert!(task.ends_with("not a summary."));
    }
}
