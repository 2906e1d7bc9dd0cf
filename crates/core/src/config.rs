//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup (binaries read the environment) and
//! then passed into core services as `Arc<CoreConfig>`. Nothing in this crate reads
//! environment variables during request or job handling.

use crate::constants::{
    DEFAULT_COMPREHENSIVE_EVERY, DEFAULT_END_CALL_GRACE, DEFAULT_MAX_RETRIES,
    DEFAULT_MISS_LOOKBACK_CALLS, DEFAULT_MISS_LOOKBACK_DAYS, DEFAULT_MISS_THRESHOLD,
    DEFAULT_RETRY_DELAY, DEFAULT_SESSION_TOKEN_TTL, DEFAULT_TRANSCRIPT_POLL_DELAYS,
};
use crate::window::CallWindow;
use crate::{CoreError, CoreResult};
use std::time::Duration;

/// Lookback used when counting consecutive missed calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MissLookback {
    pub max_calls: usize,
    pub days: i64,
    pub threshold: usize,
}

impl Default for MissLookback {
    fn default() -> Self {
        Self {
            max_calls: DEFAULT_MISS_LOOKBACK_CALLS,
            days: DEFAULT_MISS_LOOKBACK_DAYS,
            threshold: DEFAULT_MISS_THRESHOLD,
        }
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    public_base_url: String,
    window: CallWindow,
    comprehensive_every: u32,
    max_retries: u32,
    retry_delay: Duration,
    miss_lookback: MissLookback,
    end_call_grace: Duration,
    session_token_ttl: Duration,
    transcript_poll_delays: Vec<Duration>,
}

impl CoreConfig {
    /// Create a `CoreConfig` with default pacing and retry settings.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] if the public base URL is empty or is not an
    /// absolute `http(s)` URL.
    pub fn new(public_base_url: impl Into<String>, window: CallWindow) -> CoreResult<Self> {
        let public_base_url = public_base_url.into().trim().trim_end_matches('/').to_string();
        if public_base_url.is_empty() {
            return Err(CoreError::InvalidConfig(
                "public base URL cannot be empty".into(),
            ));
        }
        if !(public_base_url.starts_with("https://") || public_base_url.starts_with("http://")) {
            return Err(CoreError::InvalidConfig(format!(
                "public base URL must be absolute http(s): {public_base_url}"
            )));
        }

        Ok(Self {
            public_base_url,
            window,
            comprehensive_every: DEFAULT_COMPREHENSIVE_EVERY,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            miss_lookback: MissLookback::default(),
            end_call_grace: DEFAULT_END_CALL_GRACE,
            session_token_ttl: DEFAULT_SESSION_TOKEN_TTL,
            transcript_poll_delays: DEFAULT_TRANSCRIPT_POLL_DELAYS.to_vec(),
        })
    }

    pub fn with_comprehensive_every(mut self, every: u32) -> CoreResult<Self> {
        if every == 0 {
            return Err(CoreError::InvalidConfig(
                "comprehensive interval must be at least 1".into(),
            ));
        }
        self.comprehensive_every = every;
        Ok(self)
    }

    pub fn with_retries(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_miss_lookback(mut self, lookback: MissLookback) -> CoreResult<Self> {
        if lookback.max_calls == 0 || lookback.days <= 0 || lookback.threshold == 0 {
            return Err(CoreError::InvalidConfig(
                "miss lookback values must be positive".into(),
            ));
        }
        self.miss_lookback = lookback;
        Ok(self)
    }

    pub fn with_end_call_grace(mut self, grace: Duration) -> Self {
        self.end_call_grace = grace;
        self
    }

    pub fn with_session_token_ttl(mut self, ttl: Duration) -> Self {
        self.session_token_ttl = ttl;
        self
    }

    pub fn with_transcript_poll_delays(mut self, delays: Vec<Duration>) -> CoreResult<Self> {
        if delays.is_empty() {
            return Err(CoreError::InvalidConfig(
                "transcript poll schedule cannot be empty".into(),
            ));
        }
        self.transcript_poll_delays = delays;
        Ok(self)
    }

    pub fn public_base_url(&self) -> &str {
        &self.public_base_url
    }

    /// Public URL for a webhook path, e.g. `webhook_url("/webhooks/status")`.
    pub fn webhook_url(&self, path: &str) -> String {
        format!("{}{}", self.public_base_url, path)
    }

    /// WebSocket URL for the real-time transport, derived from the public base URL.
    pub fn transport_url(&self, token: &str) -> String {
        let ws_base = if let Some(rest) = self.public_base_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.public_base_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.public_base_url.clone()
        };
        format!("{ws_base}/ws?token={token}")
    }

    pub fn window(&self) -> &CallWindow {
        &self.window
    }

    pub fn comprehensive_every(&self) -> u32 {
        self.comprehensive_every
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    pub fn miss_lookback(&self) -> MissLookback {
        self.miss_lookback
    }

    pub fn end_call_grace(&self) -> Duration {
        self.end_call_grace
    }

    pub fn session_token_ttl(&self) -> Duration {
        self.session_token_ttl
    }

    pub fn transcript_poll_delays(&self) -> &[Duration] {
        &self.transcript_poll_delays
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> CallWindow {
        CallWindow::parse("09:00", "17:00", "Europe/London").unwrap()
    }

    #[test]
    fn trims_trailing_slash_and_derives_urls() {
        let cfg = CoreConfig::new("https://calls.example.org/", window()).unwrap();
        assert_eq!(
            cfg.webhook_url("/webhooks/status"),
            "https://calls.example.org/webhooks/status"
        );
        assert_eq!(
            cfg.transport_url("abc"),
            "wss://calls.example.org/ws?token=abc"
        );
    }

    #[test]
    fn rejects_relative_base_url() {
        let err = CoreConfig::new("calls.example.org", window()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_zero_comprehensive_interval() {
        let cfg = CoreConfig::new("https://calls.example.org", window()).unwrap();
        assert!(cfg.with_comprehensive_every(0).is_err());
    }

    #[test]
    fn defaults_match_pacing_policy() {
        let cfg = CoreConfig::new("https://calls.example.org", window()).unwrap();
        assert_eq!(cfg.comprehensive_every(), 13);
        assert_eq!(cfg.max_retries(), 2);
        assert_eq!(cfg.retry_delay(), Duration::from_secs(900));
        assert_eq!(cfg.miss_lookback(), MissLookback::default());
        assert_eq!(cfg.transcript_poll_delays().len(), 4);
    }
}
