// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request and response bodies for the enclave platform endpoints.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Enclave descriptor returned by `GET /api/enclaves/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnclaveDescriptor {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_config: Option<ProviderConfig>,
}

impl EnclaveDescriptor {
    /// The blockchain signing address, if the enclave was provisioned with one.
    pub fn signing_address(&self) -> Option<&str> {
        self.provider_config
            .as_ref()
            .and_then(|c| c.signing_address.as_deref())
            .map(str::trim)
            .filter(|a| !a.is_empty())
    }
}

/// Provider-specific enclave settings. Only the signing address is interpreted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_address: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The platform returns the descriptor either bare or as `{ "enclave": {...} }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum EnclaveEnvelope {
    Wrapped { enclave: EnclaveDescriptor },
    Bare(EnclaveDescriptor),
}

impl EnclaveEnvelope {
    pub(crate) fn into_descriptor(self) -> EnclaveDescriptor {
        match self {
            EnclaveEnvelope::Wrapped { enclave } => enclave,
            EnclaveEnvelope::Bare(enclave) => enclave,
        }
    }
}

/// Body of `POST /api/enclaves/{id}/attestation/verify`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AttestationVerifyRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub challenge: Option<String>,
}

/// Outcome of an attestation verification. Opaque apart from the validity flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationVerification {
    pub is_valid: bool,
    #[serde(default)]
    pub verification_details: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignTransactionRequest {
    pub unsigned_transaction: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignTransactionResponse {
    pub signed_transaction: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignMessageRequest {
    pub message: String,
}

/// `{domain, types, value}`, with `EIP712Domain` removed from `types`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignTypedDataRequest {
    pub domain: Value,
    pub types: Value,
    pub value: Value,
}

/// Response of the message and typed-data signing endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SignatureResponse {
    pub signature: String,
}
