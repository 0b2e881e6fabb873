// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Error taxonomy shared by every signer variant.
//!
//! | Variant | Cause | Retry? |
//! |---------|-------|--------|
//! | `Configuration` | missing key, enclave id or signing address | never |
//! | `Environment` | no injected wallet in this runtime | switch signer type |
//! | `Attestation` | enclave failed its integrity check | only after re-verification |
//! | `Transport` | network or HTTP failure talking to the platform | caller's discretion |
//!
//! Nothing in this crate retries or recovers locally: every failure is
//! propagated to the caller with the enclave id and operation attached.

use std::fmt;

use serde_json::Value;

/// Convenience alias used across the crate.
pub type Result<T, E = SignerError> = std::result::Result<T, E>;

/// The operation a signer was attempting when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SigningOperation {
    GetAddress,
    VerifyAttestation,
    SignTransaction,
    SignMessage,
    SignTypedData,
}

impl SigningOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            SigningOperation::GetAddress => "get-address",
            SigningOperation::VerifyAttestation => "verify-attestation",
            SigningOperation::SignTransaction => "sign-transaction",
            SigningOperation::SignMessage => "sign-message",
            SigningOperation::SignTypedData => "sign-typed-data",
        }
    }
}

impl fmt::Display for SigningOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures talking to the remote platform over HTTP.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("Invalid platform URL: {0}")]
    InvalidUrl(String),

    #[error("Request failed: {0}")]
    Network(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl TransportError {
    /// HTTP status code, if the platform answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether retrying the same request later could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Network(_) => true,
            TransportError::Http { status, .. } => *status >= 500 || *status == 429,
            TransportError::InvalidUrl(_) | TransportError::InvalidResponse(_) => false,
        }
    }
}

/// Errors returned by signer providers and signing handles.
#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    /// Caller mistake: missing key, enclave id, or signing address.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The current runtime cannot host this signer type.
    #[error("Environment error: {0}")]
    Environment(String),

    /// The remote enclave failed its integrity check. Signing was not attempted.
    #[error("Attestation verification failed for enclave {enclave_id}: {details}")]
    Attestation { enclave_id: String, details: Value },

    /// The platform could not be reached or answered with an error.
    #[error("Enclave {enclave_id}: {operation} failed: {source}")]
    Transport {
        enclave_id: String,
        operation: SigningOperation,
        #[source]
        source: TransportError,
    },

    /// The wallet user declined the request.
    #[error("Wallet request rejected by user during {operation}: {message}")]
    WalletRejected {
        operation: SigningOperation,
        message: String,
    },

    /// The injected wallet failed for a reason other than user rejection.
    #[error("Wallet request {method} failed: {message}")]
    Wallet { method: String, message: String },

    /// The network provider handed to `get_signer` failed.
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Signing failed: {0}")]
    Signing(String),
}

impl SignerError {
    /// Stable machine-readable code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            SignerError::Configuration(_) => "configuration_error",
            SignerError::Environment(_) => "environment_error",
            SignerError::Attestation { .. } => "attestation_error",
            SignerError::Transport { .. } => "transport_error",
            SignerError::WalletRejected { .. } => "wallet_rejected",
            SignerError::Wallet { .. } => "wallet_error",
            SignerError::Provider(_) => "provider_error",
            SignerError::InvalidSignature(_) => "invalid_signature",
            SignerError::Signing(_) => "signing_error",
        }
    }

    /// Only transport failures are ever worth retrying, and only some of them.
    pub fn is_retryable(&self) -> bool {
        match self {
            SignerError::Transport { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    pub(crate) fn transport(
        enclave_id: impl Into<String>,
        operation: SigningOperation,
        source: TransportError,
    ) -> Self {
        SignerError::Transport {
            enclave_id: enclave_id.into(),
            operation,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn attestation_error_embeds_details() {
        let err = SignerError::Attestation {
            enclave_id: "enc-1".to_string(),
            details: json!({ "reason": "pcr-mismatch" }),
        };
        let message = err.to_string();
        assert!(message.contains("enc-1"));
        assert!(message.contains("pcr-mismatch"));
        assert_eq!(err.error_code(), "attestation_error");
    }

    #[test]
    fn transport_error_names_enclave_and_operation() {
        let err = SignerError::transport(
            "enc-1",
            SigningOperation::SignMessage,
            TransportError::Http {
                status: 500,
                message: "enclave busy".to_string(),
            },
        );
        let message = err.to_string();
        assert!(message.contains("enc-1"));
        assert!(message.contains("sign-message"));
        assert!(message.contains("enclave busy"));
        assert!(err.is_retryable());
    }

    #[test]
    fn retryability_by_status() {
        let bad_request = TransportError::Http {
            status: 400,
            message: "bad".to_string(),
        };
        assert!(!bad_request.is_retryable());
        assert_eq!(bad_request.status(), Some(400));

        let throttled = TransportError::Http {
            status: 429,
            message: "slow down".to_string(),
        };
        assert!(throttled.is_retryable());

        assert!(TransportError::Network("reset".to_string()).is_retryable());
        assert!(!TransportError::InvalidResponse("junk".to_string()).is_retryable());
        assert!(!SignerError::Configuration("missing".to_string()).is_retryable());
    }

    #[test]
    fn rejection_and_attestation_have_distinct_codes() {
        let rejected = SignerError::WalletRejected {
            operation: SigningOperation::GetAddress,
            message: "User rejected the request.".to_string(),
        };
        assert_eq!(rejected.error_code(), "wallet_rejected");
        assert!(rejected.to_string().contains("rejected by user"));
    }
}
