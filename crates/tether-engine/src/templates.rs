// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message templates rendered with `minijinja`.
//!
//! Undefined variables are errors, so a template that references anything
//! outside [`TemplateVars`] is rejected when it is saved, not when a sweep
//! tries to send it.

use minijinja::{Environment, UndefinedBehavior};
use serde::Serialize;

use tether_core::TetherError;
use tether_core::model::Conversation;

/// Variables available to every template.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateVars {
    pub contact_name: String,
    pub contact_address: String,
    pub attempt: u32,
    pub max_attempts: u32,
    pub rule_name: String,
}

impl TemplateVars {
    /// Falls back to the address when the contact has no display name.
    pub fn for_conversation(conversation: &Conversation) -> Self {
        Self {
            contact_name: conversation
                .contact_display_name
                .clone()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| conversation.contact_address.clone()),
            contact_address: conversation.contact_address.clone(),
            attempt: 1,
            max_attempts: 1,
            rule_name: String::new(),
        }
    }

    pub fn with_rule(mut self, rule_name: &str, attempt: u32, max_attempts: u32) -> Self {
        self.rule_name = rule_name.to_string();
        self.attempt = attempt;
        self.max_attempts = max_attempts;
        self
    }

    fn sample() -> Self {
        Self {
            contact_name: "Ada".into(),
            contact_address: "+15550100".into(),
            attempt: 1,
            max_attempts: 3,
            rule_name: "sample".into(),
        }
    }
}

pub struct TemplateRenderer {
    env: Environment<'static>,
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRenderer {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        Self { env }
    }

    pub fn render(&self, source: &str, vars: &TemplateVars) -> Result<String, TetherError> {
        let rendered = self
            .env
            .render_str(source, vars)
            .map_err(|e| TetherError::Validation(format!("template error: {e}")))?;
        let rendered = rendered.trim().to_string();
        if rendered.is_empty() {
            return Err(TetherError::Validation("template rendered to an empty message".into()));
        }
        Ok(rendered)
    }

    /// Checks syntax and variable names by rendering against sample values.
    pub fn validate(&self, source: &str) -> Result<(), TetherError> {
        self.render(source, &TemplateVars::sample()).map(|_| ())
    }
}
