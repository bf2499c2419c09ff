// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded exponential backoff for transient provider failures.

use std::time::Duration;

use atendente_config::model::GeminiConfig;

const BASE_DELAY_MS: u64 = 1000;
const MAX_DELAY_MS: u64 = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total provider calls allowed for one generation, the first included.
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// Delay before the retry that follows failed attempt number `attempt` (1-based):
    /// `min(1000 * 2^(attempt - 1), 5000)` milliseconds.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let millis = 1u64
            .checked_shl(exponent)
            .and_then(|factor| BASE_DELAY_MS.checked_mul(factor))
            .map_or(MAX_DELAY_MS, |ms| ms.min(MAX_DELAY_MS));
        Duration::from_millis(millis)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

impl From<&GeminiConfig> for RetryPolicy {
    fn from(config: &GeminiConfig) -> Self {
        Self::new(config.max_retries)
    }
}
