// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `schedule:` block of a pipeline package.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Errors from schedule configuration
#[derive(Debug, Error)]
pub enum ScheduleConfigError {
    #[error("invalid cron expression {value:?}: {source}")]
    InvalidCron {
        value: String,
        #[source]
        source: cron::error::Error,
    },
    #[error("unknown timezone {0:?}")]
    InvalidTimezone(String),
}

fn default_enabled() -> bool {
    true
}

/// Cron trigger configuration for one pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Cron expression (seconds-resolution, six or seven fields).
    pub cron: String,
    /// IANA timezone the expression is evaluated in. Defaults to UTC.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, rename = "retryPolicy")]
    pub retry_policy: RetryPolicy,
    #[serde(default, rename = "missedExecution")]
    pub missed_execution: MissedExecution,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<Window>,
}

/// Retry behaviour after a failed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default, rename = "maxRetries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms", rename = "delayMs")]
    pub delay_ms: u64,
}

fn default_retry_delay_ms() -> u64 {
    60_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 0, delay_ms: default_retry_delay_ms() }
    }
}

/// What to do with a `nextRun` that is already in the past at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissedExecution {
    /// Queue the missed run immediately.
    #[default]
    Run,
    /// Advance to the next future occurrence.
    Skip,
}

/// Bound on how late a timer fire may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    #[serde(rename = "maxDelayMinutes")]
    pub max_delay_minutes: u32,
}

impl ScheduleConfig {
    pub fn tz(&self) -> Result<chrono_tz::Tz, ScheduleConfigError> {
        match &self.timezone {
            None => Ok(chrono_tz::UTC),
            Some(name) => name
                .parse()
                .map_err(|_| ScheduleConfigError::InvalidTimezone(name.clone())),
        }
    }

    fn schedule(&self) -> Result<cron::Schedule, ScheduleConfigError> {
        cron::Schedule::from_str(&self.cron).map_err(|source| ScheduleConfigError::InvalidCron {
            value: self.cron.clone(),
            source,
        })
    }

    /// Parse-check the expression and timezone.
    pub fn check(&self) -> Result<(), ScheduleConfigError> {
        self.schedule()?;
        self.tz()?;
        Ok(())
    }

    /// Next occurrence strictly after `after`, computed in the configured
    /// timezone and returned in UTC.
    pub fn next_after(
        &self,
        after: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, ScheduleConfigError> {
        let tz = self.tz()?;
        let schedule = self.schedule()?;
        Ok(schedule
            .after(&after.with_timezone(&tz))
            .next()
            .map(|occurrence| occurrence.with_timezone(&Utc)))
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
