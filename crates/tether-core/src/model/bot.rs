// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-instance bot configuration.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::TetherError;

/// Bot settings for one messaging instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotConfig {
    pub tenant_id: String,
    /// One configuration per messaging instance.
    pub instance_id: String,
    /// New conversations start bot-owned only when enabled.
    pub enabled: bool,
    /// Passed through to the external bot; unused by the engine itself.
    #[serde(default)]
    pub model: ModelParams,
    /// Inbound messages containing any of these words hand off to a human.
    #[serde(default)]
    pub transfer_keywords: Vec<String>,
    /// Qualification score at or above which the bot hands off.
    pub qualification_threshold: Option<f64>,
    /// Team that receives bot transfers. `None` leaves the conversation queued.
    pub transfer_team_id: Option<String>,
    /// `None` means always open.
    pub business_hours: Option<BusinessHours>,
    #[serde(default)]
    pub templates: BotTemplates,
}

impl BotConfig {
    /// Defaults used for an instance without stored configuration.
    pub fn disabled(tenant_id: &str, instance_id: &str) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            instance_id: instance_id.to_string(),
            enabled: false,
            model: ModelParams::default(),
            transfer_keywords: Vec::new(),
            qualification_threshold: None,
            transfer_team_id: None,
            business_hours: None,
            templates: BotTemplates::default(),
        }
    }

    pub fn validate(&self) -> Result<(), TetherError> {
        if self.transfer_keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(TetherError::Validation(
                "transfer keywords must not be empty".into(),
            ));
        }
        if let Some(threshold) = self.qualification_threshold.filter(|t| !(0.0..=1.0).contains(t)) {
            return Err(TetherError::Validation(format!(
                "qualification_threshold must be within 0.0..=1.0, got {threshold}"
            )));
        }
        if let Some(hours) = &self.business_hours {
            hours.validate()?;
        }
        Ok(())
    }

    pub fn is_business_hours(&self, at: DateTime<Utc>) -> bool {
        self.business_hours
            .as_ref()
            .is_none_or(|hours| hours.contains(at))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    pub name: String,
    pub temperature: f32,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            name: "default".into(),
            temperature: 0.3,
        }
    }
}

/// Opening hours in UTC. `end_hour` is exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessHours {
    pub start_hour: u32,
    pub end_hour: u32,
    /// ISO weekday numbers, Monday = 1.
    pub weekdays: Vec<u32>,
}

impl BusinessHours {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let day = at.weekday().number_from_monday();
        let hour = at.hour();
        self.weekdays.contains(&day) && hour >= self.start_hour && hour < self.end_hour
    }

    fn validate(&self) -> Result<(), TetherError> {
        if self.start_hour >= self.end_hour || self.end_hour > 24 {
            return Err(TetherError::Validation(format!(
                "business hours {}..{} are not a valid range",
                self.start_hour, self.end_hour
            )));
        }
        if self.weekdays.iter().any(|d| !(1..=7).contains(d)) {
            return Err(TetherError::Validation(
                "weekdays must be between 1 (Monday) and 7 (Sunday)".into(),
            ));
        }
        Ok(())
    }

    /// Monday to Friday, 09:00 to 18:00 UTC.
    pub fn office() -> Self {
        Self {
            start_hour: 9,
            end_hour: 18,
            weekdays: [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri]
                .iter()
                .map(|d| d.number_from_monday())
                .collect(),
        }
    }
}

/// Message templates sent to the contact at handoff points.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotTemplates {
    /// Sent when a new conversation starts with the bot.
    pub welcome: Option<String>,
    /// Sent instead of `transfer` outside business hours.
    pub away: Option<String>,
    pub transfer: Option<String>,
    /// Sent when an operator closes the conversation.
    pub closing: Option<String>,
}
