// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults, and the typed configuration values
//! built from them. Explicit constructor arguments always take precedence;
//! the `from_env` helpers exist for services that configure themselves from
//! the process environment.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `ENCLAVE_PLATFORM_URL` | Base URL of the enclave platform API | `http://localhost:3000` |
//! | `ENCLAVE_PLATFORM_API_KEY` | Bearer token sent with every platform request | None |
//! | `ENCLAVE_PLATFORM_TIMEOUT_SECS` | Per-request timeout | `30` |
//! | `ENCLAVE_SIGNER_ENV` | Runtime environment (`production`, `development`, `test`); falls back to `APP_ENV` | `development` |
//! | `SIGNER_TYPE` | `local`, `enclave` or `browser-wallet` | Required by [`SignerSettings::from_env`] |
//! | `SIGNER_PRIVATE_KEY` | Hex private key for the local signer | Required for `local` |
//! | `ENCLAVE_ID` | Enclave holding the signing key | Required for `enclave` |
//! | `ENCLAVE_VERIFY_ATTESTATION` | Verify attestation before every signature | `true` |
//! | `ENCLAVE_ATTESTATION_NONCE` | Replay-protection nonce sent with verification | None |
//! | `ENCLAVE_ALLOW_UNVERIFIED` | Permit disabled attestation in production | `false` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::{fmt, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, SignerError};

pub const PLATFORM_URL_ENV: &str = "ENCLAVE_PLATFORM_URL";
pub const PLATFORM_API_KEY_ENV: &str = "ENCLAVE_PLATFORM_API_KEY";
pub const PLATFORM_TIMEOUT_ENV: &str = "ENCLAVE_PLATFORM_TIMEOUT_SECS";
pub const RUNTIME_ENV: &str = "ENCLAVE_SIGNER_ENV";
pub const RUNTIME_FALLBACK_ENV: &str = "APP_ENV";
pub const SIGNER_TYPE_ENV: &str = "SIGNER_TYPE";
pub const SIGNER_PRIVATE_KEY_ENV: &str = "SIGNER_PRIVATE_KEY";
pub const ENCLAVE_ID_ENV: &str = "ENCLAVE_ID";
pub const ENCLAVE_VERIFY_ATTESTATION_ENV: &str = "ENCLAVE_VERIFY_ATTESTATION";
pub const ENCLAVE_ATTESTATION_NONCE_ENV: &str = "ENCLAVE_ATTESTATION_NONCE";
pub const ENCLAVE_ALLOW_UNVERIFIED_ENV: &str = "ENCLAVE_ALLOW_UNVERIFIED";

/// Base URL used when none is configured.
pub const DEFAULT_PLATFORM_URL: &str = "http://localhost:3000";

/// Platform request timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Where the process is running. Drives advisory warnings and the
/// attestation policy, never the signing semantics themselves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RuntimeEnvironment {
    #[default]
    Development,
    Test,
    Production,
}

impl RuntimeEnvironment {
    /// Detect the environment from `ENCLAVE_SIGNER_ENV`, then `APP_ENV`.
    pub fn detect() -> Self {
        Self::from_lookup(env_optional)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let Some(raw) = lookup(RUNTIME_ENV).or_else(|| lookup(RUNTIME_FALLBACK_ENV)) else {
            return Self::default();
        };
        raw.parse().unwrap_or_else(|_| {
            tracing::warn!(value = %raw, "Unrecognised runtime environment, assuming development");
            Self::default()
        })
    }

    pub fn is_production(&self) -> bool {
        matches!(self, RuntimeEnvironment::Production)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RuntimeEnvironment::Development => "development",
            RuntimeEnvironment::Test => "test",
            RuntimeEnvironment::Production => "production",
        }
    }
}

impl FromStr for RuntimeEnvironment {
    type Err = SignerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(RuntimeEnvironment::Production),
            "development" | "dev" => Ok(RuntimeEnvironment::Development),
            "test" => Ok(RuntimeEnvironment::Test),
            other => Err(SignerError::Configuration(format!(
                "unknown runtime environment `{other}`"
            ))),
        }
    }
}

impl fmt::Display for RuntimeEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection settings for the remote enclave platform.
#[derive(Clone)]
pub struct PlatformConfig {
    pub base_url: Url,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl PlatformConfig {
    /// Create a configuration for the given base URL with default timeout and no API key.
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Load from `ENCLAVE_PLATFORM_*` variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(env_optional)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let base_url = lookup(PLATFORM_URL_ENV).unwrap_or_else(|| DEFAULT_PLATFORM_URL.to_string());
        let mut config = Self::new(&base_url)?;

        if let Some(api_key) = lookup(PLATFORM_API_KEY_ENV) {
            config = config.with_api_key(api_key);
        }

        if let Some(raw) = lookup(PLATFORM_TIMEOUT_ENV) {
            let secs: u64 = raw.parse().map_err(|_| {
                SignerError::Configuration(format!(
                    "{PLATFORM_TIMEOUT_ENV} must be a whole number of seconds, got `{raw}`"
                ))
            })?;
            config = config.with_timeout(Duration::from_secs(secs));
        }

        Ok(config)
    }
}

impl fmt::Debug for PlatformConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformConfig")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| SignerError::Configuration(format!("invalid platform URL `{raw}`: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(SignerError::Configuration(format!(
            "platform URL must be http or https, got `{scheme}`"
        ))),
    }
}

/// Declarative signer selection, deserializable from JSON or built from the environment.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SignerSettings {
    Local {
        private_key: String,
    },
    Enclave {
        enclave_id: String,
        #[serde(default = "default_true")]
        verify_attestation: bool,
        #[serde(default)]
        attestation_nonce: Option<String>,
        #[serde(default)]
        allow_unverified_in_production: bool,
    },
    BrowserWallet,
}

fn default_true() -> bool {
    true
}

impl SignerSettings {
    /// Build settings from `SIGNER_TYPE` and the variables that type needs.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(env_optional)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |name: &str| {
            lookup(name).ok_or_else(|| {
                SignerError::Configuration(format!("{name} environment variable is required"))
            })
        };

        let kind = required(SIGNER_TYPE_ENV)?;
        match kind.to_ascii_lowercase().as_str() {
            "local" => Ok(SignerSettings::Local {
                private_key: required(SIGNER_PRIVATE_KEY_ENV)?,
            }),
            "enclave" => Ok(SignerSettings::Enclave {
                enclave_id: required(ENCLAVE_ID_ENV)?,
                verify_attestation: parse_bool(
                    ENCLAVE_VERIFY_ATTESTATION_ENV,
                    lookup(ENCLAVE_VERIFY_ATTESTATION_ENV),
                    true,
                )?,
                attestation_nonce: lookup(ENCLAVE_ATTESTATION_NONCE_ENV),
                allow_unverified_in_production: parse_bool(
                    ENCLAVE_ALLOW_UNVERIFIED_ENV,
                    lookup(ENCLAVE_ALLOW_UNVERIFIED_ENV),
                    false,
                )?,
            }),
            "browser-wallet" | "browser" => Ok(SignerSettings::BrowserWallet),
            other => Err(SignerError::Configuration(format!(
                "unknown {SIGNER_TYPE_ENV} `{other}` (expected local, enclave or browser-wallet)"
            ))),
        }
    }
}

impl fmt::Debug for SignerSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignerSettings::Local { .. } => f
                .debug_struct("Local")
                .field("private_key", &"<redacted>")
                .finish(),
            SignerSettings::Enclave {
                enclave_id,
                verify_attestation,
                attestation_nonce,
                allow_unverified_in_production,
            } => f
                .debug_struct("Enclave")
                .field("enclave_id", enclave_id)
                .field("verify_attestation", verify_attestation)
                .field("attestation_nonce", attestation_nonce)
                .field("allow_unverified_in_production", allow_unverified_in_production)
                .finish(),
            SignerSettings::BrowserWallet => f.write_str("BrowserWallet"),
        }
    }
}

fn parse_bool(name: &str, raw: Option<String>, default: bool) -> Result<bool> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(SignerError::Configuration(format!(
            "{name} must be a boolean, got `{raw}`"
        ))),
    }
}

/// Read a variable, treating blank values as unset.
pub(crate) fn env_optional(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
