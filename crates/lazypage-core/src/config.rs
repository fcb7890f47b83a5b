//! lazypage configuration
//!
//! Library defaults with runtime environment overrides.
//!
//! # Example
//!
//! ```rust,ignore
//! use lazypage_core::config::PagerConfig;
//! use lazypage_core::policy::PolicyKind;
//!
//! let config = PagerConfig::from_env()
//!     .default_policy(PolicyKind::Static)
//!     .strict_placement(true);
//! ```

use std::time::Duration;

use crate::constants;
use crate::env::{env_get, env_get_bool, env_get_str};
use crate::policy::PolicyKind;
use crate::wire::WireFormat;

#[derive(Debug, Clone)]
pub struct PagerConfig {
    /// Content policy; `None` lets the mode pick its own default
    pub policy: Option<PolicyKind>,
    /// First byte of the rotating fill
    pub fill_base: u8,
    /// Originator listen port
    pub port: u16,
    /// Host the peer connects to
    pub peer_host: String,
    /// Delay between peer connection attempts
    pub connect_retry: Duration,
    /// Descriptor record layout
    pub wire: WireFormat,
    /// Refuse to run the peer if its region cannot sit at the requested address
    pub strict_placement: bool,
    /// Bytes of a page shown when the console dumps it
    pub preview_bytes: usize,
}

impl Default for PagerConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl PagerConfig {
    /// Create config from defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `LAZYPAGE_POLICY` - rotating | static
    /// - `LAZYPAGE_FILL_BASE` - first character of the rotating fill
    /// - `LAZYPAGE_PORT` - originator port
    /// - `LAZYPAGE_PEER_HOST` - host the peer connects to
    /// - `LAZYPAGE_CONNECT_RETRY_MS` - peer retry delay in milliseconds
    /// - `LAZYPAGE_WIRE` - framed | raw
    /// - `LAZYPAGE_STRICT_PLACEMENT` - fail instead of relocating (0/1)
    /// - `LAZYPAGE_PREVIEW` - bytes shown per page dump
    pub fn from_env() -> Self {
        let defaults = Self::new();
        Self {
            policy: std::env::var("LAZYPAGE_POLICY")
                .ok()
                .and_then(|v| v.parse().ok())
                .or(defaults.policy),
            fill_base: env_get_str("LAZYPAGE_FILL_BASE", "")
                .bytes()
                .next()
                .unwrap_or(defaults.fill_base),
            port: env_get("LAZYPAGE_PORT", defaults.port),
            peer_host: env_get_str("LAZYPAGE_PEER_HOST", &defaults.peer_host),
            connect_retry: Duration::from_millis(env_get(
                "LAZYPAGE_CONNECT_RETRY_MS",
                constants::CONNECT_RETRY_MS,
            )),
            wire: env_get("LAZYPAGE_WIRE", defaults.wire),
            strict_placement: env_get_bool("LAZYPAGE_STRICT_PLACEMENT", defaults.strict_placement),
            preview_bytes: env_get("LAZYPAGE_PREVIEW", defaults.preview_bytes),
        }
    }

    /// Create config with library defaults (no env override).
    pub fn new() -> Self {
        Self {
            policy: None,
            fill_base: constants::FILL_BASE,
            port: constants::DEFAULT_PORT,
            peer_host: constants::DEFAULT_PEER_HOST.to_string(),
            connect_retry: Duration::from_millis(constants::CONNECT_RETRY_MS),
            wire: WireFormat::Framed,
            strict_placement: false,
            preview_bytes: constants::PREVIEW_BYTES,
        }
    }

    /// Fill in the policy only if neither env nor caller chose one.
    pub fn default_policy(mut self, kind: PolicyKind) -> Self {
        self.policy.get_or_insert(kind);
        self
    }

    pub fn policy(mut self, kind: PolicyKind) -> Self {
        self.policy = Some(kind);
        self
    }

    pub fn fill_base(mut self, base: u8) -> Self {
        self.fill_base = base;
        self
    }

    pub fn wire(mut self, format: WireFormat) -> Self {
        self.wire = format;
        self
    }

    pub fn strict_placement(mut self, strict: bool) -> Self {
        self.strict_placement = strict;
        self
    }

    /// Policy to run, falling back to rotating fill.
    pub fn resolved_policy(&self) -> PolicyKind {
        self.policy.unwrap_or(PolicyKind::Rotating)
    }
}
