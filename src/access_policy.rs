// ABOUTME: AccessPolicy - allow-list/regex decision plus per-principal sliding-window quotas.
// ABOUTME: Rate-limit counters are per-principal; updates are serialized per principal (spec §5).
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use crate::auth::{Principal, ToolAccessMode};
use crate::errors::{AppError, AppResult};
use regex::Regex;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Decide whether `principal` may call `tool_name`, per spec §4.4:
/// 1. `allow_all`/literal `*` -> allow
/// 2. explicit `allowed_tools` membership -> allow
/// 3. any compiled pattern in `allowed_patterns` fully matches -> allow
/// 4. otherwise -> deny
#[must_use]
pub fn can_access(principal: &Principal, tool_name: &str) -> bool {
    match principal.tool_access_mode {
        ToolAccessMode::AllowAll => true,
        ToolAccessMode::AllowListed => principal.allowed_tools.contains(tool_name),
        ToolAccessMode::AllowRegex => matches_any_pattern(&principal.allowed_patterns, tool_name),
        ToolAccessMode::Mixed => {
            principal.allowed_tools.contains(tool_name)
                || matches_any_pattern(&principal.allowed_patterns, tool_name)
        }
    }
}

fn matches_any_pattern(patterns: &[String], tool_name: &str) -> bool {
    patterns.iter().any(|p| {
        Regex::new(&format!("^(?:{p})$"))
            .map(|re| re.is_match(tool_name))
            .unwrap_or(false)
    })
}

/// Check access and return a classified error on denial, for use directly in
/// the envelope pipeline.
///
/// # Errors
/// Returns `AccessDenied` if `can_access` would return `false`.
pub fn authorize(principal: &Principal, tool_name: &str) -> AppResult<()> {
    if can_access(principal, tool_name) {
        Ok(())
    } else {
        Err(AppError::access_denied(&principal.principal_id, tool_name))
    }
}

/// Fixed-bucket counters for one principal's requests-in-last-60s and
/// requests-in-last-3600s windows. Overshoot by at most one bucket-worth is
/// acceptable per spec §4.4.
struct Buckets {
    minute_bucket_start: Instant,
    minute_count: u32,
    hour_bucket_start: Instant,
    hour_count: u32,
}

impl Buckets {
    fn fresh(now: Instant) -> Self {
        Self {
            minute_bucket_start: now,
            minute_count: 0,
            hour_bucket_start: now,
            hour_count: 0,
        }
    }
}

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);

/// Per-principal sliding-window (approximated by fixed buckets) rate limiter.
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, Buckets>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Test-and-decrement the relevant window counters for `principal`.
    /// When both limits are unset the principal has unlimited quota.
    ///
    /// # Errors
    /// Returns `QuotaExceeded` if either configured limit is exhausted.
    pub fn check_and_record(&self, principal: &Principal) -> AppResult<()> {
        let Some(limit) = principal.rate_limit else {
            return Ok(());
        };
        if limit.requests_per_minute.is_none() && limit.requests_per_hour.is_none() {
            return Ok(());
        }

        let now = Instant::now();
        let mut table = self.buckets.lock().expect("rate limiter lock poisoned");
        let entry = table
            .entry(principal.principal_id.clone())
            .or_insert_with(|| Buckets::fresh(now));

        if now.duration_since(entry.minute_bucket_start) >= MINUTE {
            entry.minute_bucket_start = now;
            entry.minute_count = 0;
        }
        if now.duration_since(entry.hour_bucket_start) >= HOUR {
            entry.hour_bucket_start = now;
            entry.hour_count = 0;
        }

        if let Some(per_minute) = limit.requests_per_minute {
            if entry.minute_count >= per_minute {
                return Err(AppError::quota_exceeded(60));
            }
        }
        if let Some(per_hour) = limit.requests_per_hour {
            if entry.hour_count >= per_hour {
                return Err(AppError::quota_exceeded(3600));
            }
        }

        entry.minute_count += 1;
        entry.hour_count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{build_principal, PrincipalKind, RateLimit};
    use std::collections::HashSet;

    #[test]
    fn wildcard_allows_everything() {
        let principal = build_principal(
            "p",
            PrincipalKind::ApiKey,
            HashSet::new(),
            HashSet::from(["*".to_string()]),
            Vec::new(),
        );
        assert!(can_access(&principal, "anything"));
    }

    #[test]
    fn allow_listed_denies_other_tools() {
        let principal = build_principal(
            "p",
            PrincipalKind::ApiKey,
            HashSet::new(),
            HashSet::from(["echo".to_string()]),
            Vec::new(),
        );
        assert!(can_access(&principal, "echo"));
        assert!(!can_access(&principal, "secret_tool"));
    }

    #[test]
    fn regex_pattern_must_fully_match() {
        let principal = build_principal(
            "p",
            PrincipalKind::ApiKey,
            HashSet::new(),
            HashSet::new(),
            vec!["report_.*".to_string()],
        );
        assert!(can_access(&principal, "report_export"));
        assert!(!can_access(&principal, "xreport_export"));
    }

    #[test]
    fn s2_quota_scenario_fourth_call_in_one_second_is_rejected() {
        let limiter = RateLimiter::new();
        let mut principal = build_principal(
            "p",
            PrincipalKind::ApiKey,
            HashSet::new(),
            HashSet::from(["echo".to_string()]),
            Vec::new(),
        );
        principal.rate_limit = Some(RateLimit {
            requests_per_minute: Some(3),
            requests_per_hour: None,
        });

        assert!(limiter.check_and_record(&principal).is_ok());
        assert!(limiter.check_and_record(&principal).is_ok());
        assert!(limiter.check_and_record(&principal).is_ok());
        let err = limiter.check_and_record(&principal).unwrap_err();
        assert_eq!(err.kind, crate::errors::ErrorKind::QuotaExceeded);
    }

    #[test]
    fn unset_limits_mean_unlimited_quota() {
        let limiter = RateLimiter::new();
        let principal = build_principal(
            "p",
            PrincipalKind::ApiKey,
            HashSet::new(),
            HashSet::from(["echo".to_string()]),
            Vec::new(),
        );
        for _ in 0..1000 {
            assert!(limiter.check_and_record(&principal).is_ok());
        }
    }
}
