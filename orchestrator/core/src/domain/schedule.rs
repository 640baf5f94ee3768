// Copyright (c) 2026 NAS Orchestrator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Job schedule expressions.
//!
//! Accepted forms are `@every <duration>` and a bare duration, both using
//! humantime syntax (`15s`, `1m 30s`, `2h`).

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid schedule '{expr}': {reason}")]
pub struct ScheduleParseError {
    pub expr: String,
    pub reason: String,
}

/// Parse a schedule into a fixed interval.
pub fn parse_schedule(expr: &str) -> Result<Duration, ScheduleParseError> {
    let trimmed = expr.trim();
    let body = trimmed
        .strip_prefix("@every")
        .map(str::trim)
        .unwrap_or(trimmed);

    let interval = humantime_serde::re::humantime::parse_duration(body).map_err(|e| {
        ScheduleParseError {
            expr: expr.to_string(),
            reason: e.to_string(),
        }
    })?;

    if interval.is_zero() {
        return Err(ScheduleParseError {
            expr: expr.to_string(),
            reason: "interval must be greater than zero".to_string(),
        });
    }
    Ok(interval)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_syntax() {
        assert_eq!(parse_schedule("@every 15s").unwrap(), Duration::from_secs(15));
        assert_eq!(parse_schedule("@every 1m 30s").unwrap(), Duration::from_secs(90));
    }

    #[test]
    fn test_bare_duration() {
        assert_eq!(parse_schedule("30s").unwrap(), Duration::from_secs(30));
    }

    #[test]
    fn test_rejects_garbage_and_zero() {
        assert!(parse_schedule("*/5 * * * *").is_err());
        assert!(parse_schedule("@every").is_err());
        assert!(parse_schedule("@every 0s").is_err());
    }
}
