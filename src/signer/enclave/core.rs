// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Enclave signing core: verify attestation, then delegate signing over HTTP.
//!
//! Both presentation adapters ([`EnclaveSigner`](super::EnclaveSigner) handles
//! and [`EnclaveAccount`](super::EnclaveAccount)) are thin wrappers over this
//! type, so verification and delegation semantics cannot drift apart.

use std::str::FromStr;

use alloy::{
    dyn_abi::TypedData,
    primitives::{Address, Bytes, Signature},
};
use serde_json::Value;
use tokio::sync::OnceCell;

use crate::config::RuntimeEnvironment;
use crate::error::{Result, SignerError, SigningOperation, TransportError};
use crate::platform::{
    AttestationVerification, AttestationVerifyRequest, PlatformClient, SignTypedDataRequest,
};
use crate::signer::parse_signature;

/// Identifies the enclave holding the key and how strictly to trust it.
///
/// Immutable once handed to a signer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnclaveSignerConfig {
    pub enclave_id: String,
    /// Verify attestation before every signing call. Defaults to `true`.
    pub verify_attestation: bool,
    /// Replay-protection nonce forwarded to the verification endpoint.
    pub attestation_nonce: Option<String>,
    /// Required to disable verification when running in production.
    pub allow_unverified_in_production: bool,
}

impl EnclaveSignerConfig {
    pub fn new(enclave_id: impl Into<String>) -> Self {
        Self {
            enclave_id: enclave_id.into(),
            verify_attestation: true,
            attestation_nonce: None,
            allow_unverified_in_production: false,
        }
    }

    pub fn with_attestation_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.attestation_nonce = Some(nonce.into());
        self
    }

    pub fn without_attestation_verification(mut self) -> Self {
        self.verify_attestation = false;
        self
    }

    pub fn allow_unverified_in_production(mut self) -> Self {
        self.allow_unverified_in_production = true;
        self
    }

    fn validate(&self, runtime: RuntimeEnvironment) -> Result<()> {
        if self.enclave_id.trim().is_empty() {
            return Err(SignerError::Configuration(
                "an enclave id is required for the enclave signer".to_string(),
            ));
        }

        if !self.verify_attestation {
            if runtime.is_production() && !self.allow_unverified_in_production {
                return Err(SignerError::Configuration(format!(
                    "attestation verification for enclave {} cannot be disabled in production \
                     without an explicit override",
                    self.enclave_id
                )));
            }
            tracing::warn!(
                enclave_id = %self.enclave_id,
                %runtime,
                "Enclave signer created with attestation verification disabled"
            );
        }

        Ok(())
    }
}

#[derive(Debug)]
pub(crate) struct EnclaveSigningCore {
    client: PlatformClient,
    config: EnclaveSignerConfig,
    address: OnceCell<Address>,
}

impl EnclaveSigningCore {
    pub(crate) fn new(
        client: PlatformClient,
        mut config: EnclaveSignerConfig,
        runtime: RuntimeEnvironment,
    ) -> Result<Self> {
        config.enclave_id = config.enclave_id.trim().to_string();
        config.validate(runtime)?;
        Ok(Self {
            client,
            config,
            address: OnceCell::new(),
        })
    }

    pub(crate) fn config(&self) -> &EnclaveSignerConfig {
        &self.config
    }

    pub(crate) fn enclave_id(&self) -> &str {
        &self.config.enclave_id
    }

    /// Signing address from the enclave descriptor, fetched once per core.
    pub(crate) async fn address(&self) -> Result<Address> {
        self.address
            .get_or_try_init(|| self.fetch_address())
            .await
            .copied()
    }

    async fn fetch_address(&self) -> Result<Address> {
        let descriptor = self
            .client
            .get_enclave(self.enclave_id())
            .await
            .map_err(|e| self.transport(SigningOperation::GetAddress, e))?;

        let raw = descriptor.signing_address().ok_or_else(|| {
            SignerError::Configuration(format!(
                "enclave {} was not provisioned with blockchain signing capability \
                 (providerConfig.signingAddress is missing)",
                self.enclave_id()
            ))
        })?;

        Address::from_str(raw).map_err(|e| {
            self.transport(
                SigningOperation::GetAddress,
                TransportError::InvalidResponse(format!("invalid signing address `{raw}`: {e}")),
            )
        })
    }

    /// Ask the platform to verify the enclave. Never cached.
    pub(crate) async fn verify_attestation(&self) -> Result<AttestationVerification> {
        let request = AttestationVerifyRequest {
            nonce: self.config.attestation_nonce.clone(),
            challenge: self.config.attestation_nonce.clone(),
        };
        self.client
            .verify_attestation(self.enclave_id(), &request)
            .await
            .map_err(|e| self.transport(SigningOperation::VerifyAttestation, e))
    }

    /// Gate for every signing operation when verification is enabled.
    async fn ensure_attested(&self, operation: SigningOperation) -> Result<()> {
        if !self.config.verify_attestation {
            return Ok(());
        }

        let verification = self.verify_attestation().await?;
        if !verification.is_valid {
            tracing::error!(
                enclave_id = %self.enclave_id(),
                %operation,
                details = %verification.verification_details,
                "Enclave attestation failed, refusing to sign"
            );
            return Err(SignerError::Attestation {
                enclave_id: self.enclave_id().to_string(),
                details: verification.verification_details,
            });
        }

        tracing::debug!(enclave_id = %self.enclave_id(), %operation, "Enclave attestation verified");
        Ok(())
    }

    /// Sign a transaction given its canonical unsigned encoding.
    ///
    /// Returns the EIP-2718 encoded signed transaction produced by the enclave.
    pub(crate) async fn sign_transaction(&self, unsigned: &[u8]) -> Result<Bytes> {
        let operation = SigningOperation::SignTransaction;
        self.ensure_attested(operation).await?;
        tracing::debug!(enclave_id = %self.enclave_id(), %operation, "Forwarding signing request to enclave");

        let response = self
            .client
            .sign_transaction(self.enclave_id(), alloy::hex::encode_prefixed(unsigned))
            .await
            .map_err(|e| self.transport(operation, e))?;

        alloy::hex::decode(&response.signed_transaction)
            .map(Bytes::from)
            .map_err(|e| {
                self.transport(
                    operation,
                    TransportError::InvalidResponse(format!(
                        "signed transaction is not valid hex: {e}"
                    )),
                )
            })
    }

    /// Sign an EIP-191 message. The bytes are always sent hex-encoded.
    pub(crate) async fn sign_message(&self, message: &[u8]) -> Result<Signature> {
        let operation = SigningOperation::SignMessage;
        self.ensure_attested(operation).await?;
        tracing::debug!(enclave_id = %self.enclave_id(), %operation, "Forwarding signing request to enclave");

        let response = self
            .client
            .sign_message(self.enclave_id(), alloy::hex::encode_prefixed(message))
            .await
            .map_err(|e| self.transport(operation, e))?;
        self.signature(operation, &response.signature)
    }

    pub(crate) async fn sign_typed_data(&self, data: &TypedData) -> Result<Signature> {
        let operation = SigningOperation::SignTypedData;
        let request = typed_data_request(data)?;
        self.ensure_attested(operation).await?;
        tracing::debug!(enclave_id = %self.enclave_id(), %operation, "Forwarding signing request to enclave");

        let response = self
            .client
            .sign_typed_data(self.enclave_id(), &request)
            .await
            .map_err(|e| self.transport(operation, e))?;
        self.signature(operation, &response.signature)
    }

    fn signature(&self, operation: SigningOperation, raw: &str) -> Result<Signature> {
        parse_signature(raw)
            .map_err(|e| self.transport(operation, TransportError::InvalidResponse(e)))
    }

    fn transport(&self, operation: SigningOperation, source: TransportError) -> SignerError {
        SignerError::transport(self.enclave_id(), operation, source)
    }
}

/// Shape typed data as `{domain, types, value}` with `EIP712Domain` removed from `types`.
pub(crate) fn typed_data_request(data: &TypedData) -> Result<SignTypedDataRequest> {
    let mut json = serde_json::to_value(data)
        .map_err(|e| SignerError::Signing(format!("failed to encode typed data: {e}")))?;

    let mut take = |key: &str| json.get_mut(key).map(Value::take).unwrap_or_default();
    let domain = take("domain");
    let mut types = take("types");
    let value = take("message");

    if let Some(types) = types.as_object_mut() {
        types.remove("EIP712Domain");
    }

    Ok(SignTypedDataRequest {
        domain,
        types,
        value,
    })
}
