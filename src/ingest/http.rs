// src/ingest/http.rs
//! Resilient GET with bounded retry, exponential backoff + jitter, and
//! per-operation quota bookkeeping.
//!
//! Every outbound call of both providers goes through [`ResilientClient::get`],
//! which records one unit in the shared [`QuotaTracker`] per underlying
//! attempt. The tracker is an explicit object owned by the caller, so separate
//! runs (and tests) never share counts.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use metrics::counter;
use tracing::{info, warn};

use crate::error::{IngestError, Result};
use crate::ingest::config::HttpSettings;

pub const DEFAULT_USER_AGENT: &str = "herbert-signal/0.1";

/// In-memory call counter keyed by logical API operation (`search.list`, ...).
#[derive(Debug, Default)]
pub struct QuotaTracker {
    counts: Mutex<BTreeMap<String, u64>>,
}

impl QuotaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn record(&self, operation: &str, cost: u64) {
        let mut g = self.counts.lock().unwrap_or_else(|p| p.into_inner());
        let slot = g.entry(operation.to_string()).or_insert(0);
        *slot = slot.saturating_add(cost);
    }

    pub fn count(&self, operation: &str) -> u64 {
        let g = self.counts.lock().unwrap_or_else(|p| p.into_inner());
        g.get(operation).copied().unwrap_or(0)
    }

    /// Copy of all counters, ordered by operation name.
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.counts.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn reset(&self) {
        self.counts
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clear();
    }

    pub fn log(&self) {
        info!(target: "quota", usage = ?self.snapshot(), "quota usage");
    }
}

/// Retry knobs for one GET.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub timeout: Duration,
    /// Additional attempts after the first one.
    pub max_retries: u32,
    /// Seconds; also the upper bound of the jitter term.
    pub backoff_base: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_retries: 3,
            backoff_base: 0.5,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no sleeping.
    pub fn no_retry(timeout: Duration) -> Self {
        Self {
            timeout,
            max_retries: 0,
            backoff_base: 0.0,
        }
    }

    pub fn from_settings(s: &HttpSettings) -> Self {
        Self {
            timeout: Duration::from_secs(s.timeout_secs),
            max_retries: s.max_retries,
            backoff_base: s.backoff_base_secs.max(0.0),
        }
    }

    /// Deterministic part of the delay before retry `k` (1-indexed).
    pub fn base_delay(&self, retry: u32) -> f64 {
        let exp = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
        self.backoff_base * 2f64.powi(exp)
    }

    /// `backoff_base * 2^(k-1) + U[0, backoff_base)`.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let jitter = rand::random::<f64>() * self.backoff_base;
        let secs = self.base_delay(retry) + jitter;
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }
}

/// The single chokepoint for outbound GETs.
#[derive(Debug, Clone)]
pub struct ResilientClient {
    http: reqwest::Client,
    policy: RetryPolicy,
    quota: Arc<QuotaTracker>,
    user_agent: String,
}

impl ResilientClient {
    pub fn new(policy: RetryPolicy, quota: Arc<QuotaTracker>) -> Result<Self> {
        Self::with_user_agent(policy, quota, DEFAULT_USER_AGENT)
    }

    pub fn with_user_agent(
        policy: RetryPolicy,
        quota: Arc<QuotaTracker>,
        user_agent: &str,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(policy.timeout)
            .build()?;
        Ok(Self {
            http,
            policy,
            quota,
            user_agent: user_agent.to_string(),
        })
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn quota(&self) -> &Arc<QuotaTracker> {
        &self.quota
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// GET with the client's default policy.
    pub async fn get(
        &self,
        url: &str,
        params: &[(&str, &str)],
        operation: &str,
    ) -> Result<reqwest::Response> {
        self.get_with(url, params, operation, &self.policy).await
    }

    /// GET with an explicit policy. Transport errors and non-2xx statuses are
    /// retried up to `policy.max_retries` times; the last error is returned as
    /// [`IngestError::Network`].
    pub async fn get_with(
        &self,
        url: &str,
        params: &[(&str, &str)],
        operation: &str,
        policy: &RetryPolicy,
    ) -> Result<reqwest::Response> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            self.quota.record(operation, 1);
            counter!("http_requests_total", "op" => operation.to_string()).increment(1);

            let res = self
                .http
                .get(url)
                .query(params)
                .timeout(policy.timeout)
                .send()
                .await
                .and_then(|rsp| rsp.error_for_status());

            let err = match res {
                Ok(rsp) => return Ok(rsp),
                Err(e) => e,
            };

            if attempt > policy.max_retries {
                warn!(
                    url,
                    op = operation,
                    attempts = attempt,
                    error = %err,
                    "GET failed, retries exhausted"
                );
                counter!("http_failures_total", "op" => operation.to_string()).increment(1);
                return Err(IngestError::Network {
                    url: url.to_string(),
                    attempts: attempt,
                    source: err,
                });
            }

            let delay = policy.delay_for_retry(attempt);
            info!(
                url,
                op = operation,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "transient GET failure, retrying"
            );
            counter!("http_retries_total", "op" => operation.to_string()).increment(1);
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_counts_per_operation_and_resets() {
        let q = QuotaTracker::new();
        q.record("search.list", 1);
        q.record("search.list", 1);
        q.record("videos.list", 3);
        assert_eq!(q.count("search.list"), 2);
        assert_eq!(q.count("videos.list"), 3);
        assert_eq!(q.count("unknown"), 0);

        let snap = q.snapshot();
        assert_eq!(
            snap.keys().cloned().collect::<Vec<_>>(),
            vec!["search.list".to_string(), "videos.list".to_string()]
        );

        q.reset();
        assert!(q.snapshot().is_empty());
    }

    #[test]
    fn separate_trackers_do_not_share_state() {
        let a = QuotaTracker::shared();
        let b = QuotaTracker::shared();
        a.record("search.list", 1);
        assert_eq!(b.count("search.list"), 0);
    }

    #[test]
    fn backoff_doubles_per_retry() {
        let p = RetryPolicy {
            backoff_base: 0.5,
            ..RetryPolicy::default()
        };
        assert_eq!(p.base_delay(1), 0.5);
        assert_eq!(p.base_delay(2), 1.0);
        assert_eq!(p.base_delay(3), 2.0);
        assert_eq!(p.base_delay(4), 4.0);
    }

    #[test]
    fn jitter_stays_within_one_base_unit() {
        let p = RetryPolicy {
            backoff_base: 0.25,
            ..RetryPolicy::default()
        };
        for k in 1..=4 {
            for _ in 0..50 {
                let d = p.delay_for_retry(k).as_secs_f64();
                let lo = p.base_delay(k);
                assert!(d >= lo - 1e-9 && d < lo + 0.25 + 1e-9, "k={k} d={d}");
            }
        }
    }

    #[test]
    fn zero_base_never_sleeps() {
        let p = RetryPolicy::no_retry(Duration::from_secs(1));
        assert_eq!(p.delay_for_retry(1), Duration::ZERO);
        assert_eq!(p.max_retries, 0);
    }

    #[test]
    fn settings_map_onto_policy() {
        let s = HttpSettings {
            timeout_secs: 3,
            max_retries: 5,
            backoff_base_secs: -1.0,
        };
        let p = RetryPolicy::from_settings(&s);
        assert_eq!(p.timeout, Duration::from_secs(3));
        assert_eq!(p.max_retries, 5);
        assert_eq!(p.backoff_base, 0.0);
    }
}
