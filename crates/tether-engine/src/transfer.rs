// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deciding when the bot hands a conversation to a human.

use std::fmt;

use regex::{Regex, RegexBuilder};

use tether_core::TetherError;
use tether_core::model::BotConfig;

/// Why a bot-owned conversation is being transferred.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferTrigger {
    /// The instance's bot is switched off.
    BotDisabled,
    /// The inbound event carried an explicit handoff request.
    Requested,
    Keyword(String),
    Qualified(f64),
}

impl fmt::Display for TransferTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferTrigger::BotDisabled => write!(f, "bot disabled"),
            TransferTrigger::Requested => write!(f, "handoff requested"),
            TransferTrigger::Keyword(word) => write!(f, "keyword `{word}`"),
            TransferTrigger::Qualified(score) => write!(f, "qualification score {score:.2}"),
        }
    }
}

/// Whole-word, case-insensitive matcher over a bot's transfer keywords.
pub struct KeywordMatcher {
    pattern: Option<Regex>,
}

impl KeywordMatcher {
    pub fn new(keywords: &[String]) -> Result<Self, TetherError> {
        let alternatives: Vec<String> = keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(regex::escape)
            .collect();
        if alternatives.is_empty() {
            return Ok(Self { pattern: None });
        }
        let pattern = RegexBuilder::new(&format!(r"\b(?:{})\b", alternatives.join("|")))
            .case_insensitive(true)
            .build()
            .map_err(|e| TetherError::Validation(format!("invalid transfer keywords: {e}")))?;
        Ok(Self {
            pattern: Some(pattern),
        })
    }

    /// The first keyword occurrence in `text`, as written by the contact.
    pub fn find<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.pattern
            .as_ref()
            .and_then(|p| p.find(text))
            .map(|m| m.as_str())
    }
}

/// Evaluates the inbound handoff rules in priority order.
pub fn inbound_trigger(
    config: &BotConfig,
    content: &str,
    handoff_requested: bool,
) -> Result<Option<TransferTrigger>, TetherError> {
    if !config.enabled {
        return Ok(Some(TransferTrigger::BotDisabled));
    }
    if handoff_requested {
        return Ok(Some(TransferTrigger::Requested));
    }
    let matcher = KeywordMatcher::new(&config.transfer_keywords)?;
    Ok(matcher
        .find(content)
        .map(|word| TransferTrigger::Keyword(word.to_lowercase())))
}

/// Whether a new qualification score crosses the bot's threshold.
pub fn qualification_trigger(config: &BotConfig, score: Option<f64>) -> Option<TransferTrigger> {
    let threshold = config.qualification_threshold?;
    score
        .filter(|s| *s >= threshold)
        .map(TransferTrigger::Qualified)
}
