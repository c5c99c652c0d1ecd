// ABOUTME: Prompt templates exposed via prompts/list, prompts/get, prompts/render (spec §4.5).
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use crate::errors::{AppError, AppResult};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Clone, Serialize)]
pub struct PromptTemplate {
    pub name: String,
    pub description: String,
    pub template: String,
    pub argument_names: Vec<String>,
}

impl PromptTemplate {
    /// Substitute each `{{argument}}` marker with the supplied string value.
    ///
    /// # Errors
    /// Returns `InvalidArgument` if a required argument is missing.
    pub fn render(&self, arguments: &HashMap<String, String>) -> AppResult<String> {
        let mut rendered = self.template.clone();
        for name in &self.argument_names {
            let value = arguments
                .get(name)
                .ok_or_else(|| AppError::invalid_argument(format!("missing prompt argument '{name}'"), vec![name.clone()]))?;
            rendered = rendered.replace(&format!("{{{{{name}}}}}"), value);
        }
        Ok(rendered)
    }
}

/// In-memory prompt template table, guarded the same way the tool registry
/// guards its tool table (spec §5 concurrency discipline applied uniformly).
pub struct PromptStore {
    templates: RwLock<HashMap<String, PromptTemplate>>,
}

impl Default for PromptStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            templates: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, template: PromptTemplate) {
        self.templates.write().expect("prompt store lock poisoned").insert(template.name.clone(), template);
    }

    #[must_use]
    pub fn list(&self) -> Vec<PromptTemplate> {
        let templates = self.templates.read().expect("prompt store lock poisoned");
        let mut list: Vec<PromptTemplate> = templates.values().cloned().collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }

    /// # Errors
    /// Returns `ToolNotFound`-shaped lookup failure (no dedicated prompt
    /// error kind exists, so the closed taxonomy's `InvalidArgument` is used
    /// for an unknown prompt name).
    pub fn get(&self, name: &str) -> AppResult<PromptTemplate> {
        self.templates
            .read()
            .expect("prompt store lock poisoned")
            .get(name)
            .cloned()
            .ok_or_else(|| AppError::invalid_argument(format!("unknown prompt '{name}'"), vec!["name".to_string()]))
    }

    /// # Errors
    /// Propagates `get`'s lookup failure or `render`'s missing-argument failure.
    pub fn render(&self, name: &str, arguments: &HashMap<String, String>) -> AppResult<String> {
        self.get(name)?.render(arguments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_substitutes_named_arguments() {
        let template = PromptTemplate {
            name: "greet".to_string(),
            description: "greeting".to_string(),
            template: "Hello, {{name}}!".to_string(),
            argument_names: vec!["name".to_string()],
        };
        let mut args = HashMap::new();
        args.insert("name".to_string(), "Ada".to_string());
        assert_eq!(template.render(&args).unwrap(), "Hello, Ada!");
    }

    #[test]
    fn render_fails_on_missing_argument() {
        let template = PromptTemplate {
            name: "greet".to_string(),
            description: "greeting".to_string(),
            template: "Hello, {{name}}!".to_string(),
            argument_names: vec!["name".to_string()],
        };
        assert!(template.render(&HashMap::new()).is_err());
    }
}
