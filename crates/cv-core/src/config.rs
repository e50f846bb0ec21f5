//! Configuration parsing for the CryptoVault services.
//!
//! Everything is read from a single JSON config file. The top-level structure
//! holds logging metadata, the realtime feed settings, and the onboarding
//! settings. Every field is optional; the `effective_*` accessors supply the
//! defaults.
//!
//! # Example config
//!
//! ```json
//! {
//!   "CryptoVault": { "module_name": "cv-runner", "log_path": "/tmp/log", "log_level": "info" },
//!   "realtime": {
//!     "ws_url": "wss://ws.coincap.io/prices",
//!     "backoff": { "initial_delay_ms": 500, "max_delay_ms": 30000, "fallback_after": 6 }
//!   },
//!   "onboarding": { "state_path": "/tmp/cv/onboarding.json", "transition_ms": 300 }
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::logging::{LogFormat, LogSettings};

/// Default CoinCap prices stream.
pub const DEFAULT_WS_URL: &str = "wss://ws.coincap.io/prices";

/// Top-level application config, deserialized from a JSON file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Module metadata (name, log path, log level).
    #[serde(rename = "CryptoVault")]
    pub meta: Option<ModuleMeta>,

    /// Realtime price feed settings.
    #[serde(default)]
    pub realtime: RealtimeConfig,

    /// Onboarding flow settings.
    #[serde(default)]
    pub onboarding: OnboardingConfig,
}

impl AppConfig {
    /// Returns the module name, defaulting to `fallback`.
    pub fn module_name(&self, fallback: &str) -> String {
        self.meta.as_ref().and_then(|m| m.module_name.clone()).unwrap_or_else(|| fallback.to_string())
    }

    /// Build logging settings. Explicit (CLI) values win over the file.
    pub fn log_settings(&self, level: Option<&str>, dir: Option<&str>, fallback_name: &str) -> LogSettings {
        let meta = self.meta.as_ref();
        LogSettings {
            level: level
                .map(str::to_string)
                .or_else(|| meta.and_then(|m| m.log_level.clone()))
                .unwrap_or_else(|| "info".into()),
            dir: dir.map(str::to_string).or_else(|| meta.and_then(|m| m.log_path.clone())),
            file_prefix: self.module_name(fallback_name),
            format: meta.and_then(|m| m.log_format.as_deref()).map(LogFormat::from_name).unwrap_or_default(),
        }
    }
}

/// Module metadata block.
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleMeta {
    pub module_name: Option<String>,
    pub log_path: Option<String>,
    pub log_level: Option<String>,
    /// `"pretty"` (default) or `"json"`.
    pub log_format: Option<String>,
}

/// Realtime price feed configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RealtimeConfig {
    /// WebSocket base URL; the coin set is appended as a query.
    pub ws_url: Option<String>,

    /// Keep-alive ping interval in seconds (0 disables pinging).
    pub ping_interval_sec: Option<u64>,

    /// Handshake timeout in milliseconds.
    pub connect_timeout_ms: Option<u64>,

    /// Reconnection backoff policy.
    #[serde(default)]
    pub backoff: BackoffConfig,
}

impl RealtimeConfig {
    pub fn effective_ws_url(&self) -> String {
        self.ws_url.clone().unwrap_or_else(|| DEFAULT_WS_URL.to_string())
    }

    /// Returns `None` when pinging is disabled.
    pub fn effective_ping_interval(&self) -> Option<Duration> {
        match self.ping_interval_sec.unwrap_or(30) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn effective_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms.unwrap_or(10_000))
    }
}

/// Exponential backoff settings for reconnect attempts.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackoffConfig {
    /// Delay before the first retry.
    pub initial_delay_ms: Option<u64>,
    /// Upper bound for any single delay.
    pub max_delay_ms: Option<u64>,
    /// Growth factor per attempt (default: 2.0).
    pub multiplier: Option<f64>,
    /// Fraction of the delay that may be shaved off at random, in `[0, 1]`.
    pub jitter: Option<f64>,
    /// Give up once this many consecutive attempts have failed.
    pub fallback_after: Option<u32>,
    /// Jitter RNG seed. Derived once at construction when absent.
    pub seed: Option<u64>,
}

impl BackoffConfig {
    pub fn effective_initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms.unwrap_or(500))
    }

    /// Never smaller than the initial delay.
    pub fn effective_max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms.unwrap_or(30_000)).max(self.effective_initial_delay())
    }

    /// Values below 1.0 would shrink the delay; they are raised to 1.0.
    pub fn effective_multiplier(&self) -> f64 {
        self.multiplier.unwrap_or(2.0).max(1.0)
    }

    pub fn effective_jitter(&self) -> f64 {
        self.jitter.unwrap_or(0.2).clamp(0.0, 1.0)
    }

    pub fn effective_fallback_after(&self) -> u32 {
        self.fallback_after.unwrap_or(6).max(1)
    }
}

/// Onboarding flow configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OnboardingConfig {
    /// JSON file holding saved progress. In-memory storage when absent.
    pub state_path: Option<String>,
    /// Step transition duration in milliseconds.
    pub transition_ms: Option<u64>,
    /// Success animation duration in milliseconds.
    pub success_animation_ms: Option<u64>,
}

impl OnboardingConfig {
    pub fn effective_transition(&self) -> Duration {
        Duration::from_millis(self.transition_ms.unwrap_or(300))
    }

    pub fn effective_success_animation(&self) -> Duration {
        Duration::from_millis(self.success_animation_ms.unwrap_or(1_500))
    }
}

/// Parse a JSON config document.
pub fn parse_config(content: &str) -> anyhow::Result<AppConfig> {
    let config: AppConfig = serde_json::from_str(content).context("invalid config JSON")?;
    Ok(config)
}

/// Load and parse a JSON config file.
pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let content = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let cfg = parse_config("{}").unwrap();
        assert_eq!(cfg.realtime.effective_ws_url(), DEFAULT_WS_URL);
        assert_eq!(cfg.realtime.effective_ping_interval(), Some(Duration::from_secs(30)));
        assert_eq!(cfg.realtime.backoff.effective_initial_delay(), Duration::from_millis(500));
        assert_eq!(cfg.realtime.backoff.effective_max_delay(), Duration::from_secs(30));
        assert_eq!(cfg.realtime.backoff.effective_fallback_after(), 6);
        assert_eq!(cfg.onboarding.effective_transition(), Duration::from_millis(300));
        assert_eq!(cfg.onboarding.effective_success_animation(), Duration::from_millis(1_500));
        assert_eq!(cfg.module_name("cv-runner"), "cv-runner");
    }

    #[test]
    fn full_document() {
        let cfg = parse_config(
            r#"{
                "CryptoVault": { "module_name": "feed", "log_path": "/tmp/log", "log_format": "json" },
                "realtime": {
                    "ws_url": "wss://example.test/prices",
                    "ping_interval_sec": 0,
                    "backoff": { "initial_delay_ms": 100, "max_delay_ms": 50, "multiplier": 0.5, "jitter": 3.0, "seed": 9 }
                },
                "onboarding": { "state_path": "/tmp/cv.json", "transition_ms": 10 }
            }"#,
        )
        .unwrap();

        assert_eq!(cfg.realtime.effective_ws_url(), "wss://example.test/prices");
        assert_eq!(cfg.realtime.effective_ping_interval(), None);
        let backoff = &cfg.realtime.backoff;
        // max is raised to initial, multiplier to 1.0, jitter clamped
        assert_eq!(backoff.effective_max_delay(), Duration::from_millis(100));
        assert_eq!(backoff.effective_multiplier(), 1.0);
        assert_eq!(backoff.effective_jitter(), 1.0);
        assert_eq!(backoff.seed, Some(9));
        assert_eq!(cfg.onboarding.state_path.as_deref(), Some("/tmp/cv.json"));

        let log = cfg.log_settings(Some("debug"), None, "cv-runner");
        assert_eq!(log.level, "debug");
        assert_eq!(log.dir.as_deref(), Some("/tmp/log"));
        assert_eq!(log.file_prefix, "feed");
        assert_eq!(log.format, LogFormat::Json);
    }

    #[test]
    fn malformed_document_is_an_error() {
        assert!(parse_config("{ \"realtime\": 5 }").is_err());
    }
}
