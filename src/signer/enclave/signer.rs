// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Enclave-backed [`SignerProvider`].

use std::sync::Arc;

use alloy::{
    consensus::{SignableTransaction, TypedTransaction},
    dyn_abi::TypedData,
    primitives::{Address, Bytes, ChainId, Signature},
    providers::DynProvider,
};
use async_trait::async_trait;

use super::account::EnclaveAccount;
use super::core::{EnclaveSignerConfig, EnclaveSigningCore};
use crate::config::RuntimeEnvironment;
use crate::error::Result;
use crate::platform::{AttestationVerification, PlatformClient};
use crate::signer::{bind_chain_id, provider_chain_id, SignerKind, SignerProvider, SigningHandle};

/// Signer whose key never leaves a remote hardware enclave.
#[derive(Debug, Clone)]
pub struct EnclaveSigner {
    core: Arc<EnclaveSigningCore>,
}

impl EnclaveSigner {
    /// Create a signer, detecting the runtime environment for the attestation policy.
    pub fn new(client: PlatformClient, config: EnclaveSignerConfig) -> Result<Self> {
        Self::with_runtime(client, config, RuntimeEnvironment::detect())
    }

    /// Fails with a configuration error if the enclave id is empty, or if
    /// attestation is disabled in production without an explicit override.
    pub fn with_runtime(
        client: PlatformClient,
        config: EnclaveSignerConfig,
        runtime: RuntimeEnvironment,
    ) -> Result<Self> {
        Ok(Self {
            core: Arc::new(EnclaveSigningCore::new(client, config, runtime)?),
        })
    }

    pub fn enclave_id(&self) -> &str {
        self.core.enclave_id()
    }

    pub fn config(&self) -> &EnclaveSignerConfig {
        self.core.config()
    }

    /// Run an attestation check without signing anything.
    pub async fn verify_attestation(&self) -> Result<AttestationVerification> {
        self.core.verify_attestation().await
    }

    /// Local-account-shaped view of this signer, sharing its address cache.
    pub async fn to_account(&self) -> Result<EnclaveAccount> {
        let address = self.core.address().await?;
        Ok(EnclaveAccount::new(self.core.clone(), address))
    }
}

#[async_trait]
impl SignerProvider for EnclaveSigner {
    fn kind(&self) -> SignerKind {
        SignerKind::Enclave
    }

    async fn get_signer(&self, provider: Option<&DynProvider>) -> Result<Arc<dyn SigningHandle>> {
        let address = self.core.address().await?;
        let chain_id = provider_chain_id(provider).await?;
        Ok(Arc::new(EnclaveSigningHandle {
            core: self.core.clone(),
            address,
            chain_id,
        }))
    }

    async fn get_address(&self) -> Result<Address> {
        self.core.address().await
    }
}

/// Handle that forwards every signature request to the enclave.
#[derive(Debug, Clone)]
pub struct EnclaveSigningHandle {
    core: Arc<EnclaveSigningCore>,
    address: Address,
    chain_id: Option<ChainId>,
}

#[async_trait]
impl SigningHandle for EnclaveSigningHandle {
    fn address(&self) -> Address {
        self.address
    }

    fn chain_id(&self) -> Option<ChainId> {
        self.chain_id
    }

    async fn sign_transaction(&self, mut tx: TypedTransaction) -> Result<Bytes> {
        bind_chain_id(&mut tx, self.chain_id)?;
        self.core.sign_transaction(&tx.encoded_for_signing()).await
    }

    async fn sign_message(&self, message: &[u8]) -> Result<Signature> {
        self.core.sign_message(message).await
    }

    async fn sign_typed_data(&self, data: &TypedData) -> Result<Signature> {
        self.core.sign_typed_data(data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlatformConfig;
    use crate::error::SignerError;
    use crate::signer::test_support::*;
    use alloy::{
        consensus::TxEnvelope,
        eips::eip2718::Encodable2718,
        network::TxSignerSync,
        signers::SignerSync,
    };
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ENCLAVE: &str = "enc-tx";

    fn signer_for(server: &MockServer, config: EnclaveSignerConfig) -> EnclaveSigner {
        let client = PlatformClient::new(PlatformConfig::new(&server.uri()).unwrap()).unwrap();
        EnclaveSigner::with_runtime(client, config, RuntimeEnvironment::Test).unwrap()
    }

    async fn mount_descriptor(server: &MockServer, times: u64) {
        Mock::given(method("GET"))
            .and(path(format!("/api/enclaves/{ENCLAVE}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "enclave": {
                    "id": ENCLAVE,
                    "providerConfig": { "signingAddress": TEST_ADDRESS.to_string() }
                }
            })))
            .expect(times)
            .mount(server)
            .await;
    }

    #[test]
    fn empty_enclave_id_fails_construction() {
        let client = PlatformClient::new(PlatformConfig::new("http://localhost:3000").unwrap())
            .unwrap();
        let err = EnclaveSigner::with_runtime(
            client,
            EnclaveSignerConfig::new(""),
            RuntimeEnvironment::Test,
        )
        .unwrap_err();
        assert!(matches!(err, SignerError::Configuration(_)));
    }

    #[tokio::test]
    async fn address_is_cached_across_handles_and_accounts() {
        let server = MockServer::start().await;
        mount_descriptor(&server, 1).await;

        let signer = signer_for(&server, EnclaveSignerConfig::new(ENCLAVE));
        assert_eq!(signer.kind(), SignerKind::Enclave);
        assert_eq!(signer.get_address().await.unwrap(), TEST_ADDRESS);
        assert_eq!(signer.get_address().await.unwrap(), TEST_ADDRESS);

        let handle = signer.get_signer(None).await.unwrap();
        assert_eq!(handle.address(), TEST_ADDRESS);
        assert_eq!(handle.chain_id(), None);

        let account = signer.to_account().await.unwrap();
        assert_eq!(account.address(), TEST_ADDRESS);
    }

    #[tokio::test]
    async fn transaction_is_sent_in_unsigned_wire_form() {
        let server = MockServer::start().await;
        mount_descriptor(&server, 1).await;
        Mock::given(method("POST"))
            .and(path(format!("/api/enclaves/{ENCLAVE}/attestation/verify")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "isValid": true })))
            .expect(1)
            .mount(&server)
            .await;

        // What the enclave would produce with the same key.
        let mut tx = sample_transaction(1);
        let unsigned = alloy::hex::encode_prefixed(tx.encoded_for_signing());
        let signature = test_key_signer().sign_transaction_sync(&mut tx).unwrap();
        let signed = TxEnvelope::from(tx.into_signed(signature)).encoded_2718();

        Mock::given(method("POST"))
            .and(path(format!("/api/enclaves/{ENCLAVE}/sign/transaction")))
            .and(body_json(json!({ "unsignedTransaction": unsigned })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "signedTransaction": alloy::hex::encode_prefixed(&signed)
            })))
            .expect(1)
            .mount(&server)
            .await;

        let signer = signer_for(&server, EnclaveSignerConfig::new(ENCLAVE));
        let handle = signer.get_signer(None).await.unwrap();
        let raw = handle.sign_transaction(sample_transaction(1)).await.unwrap();
        assert_eq!(raw, Bytes::from(signed));
    }

    #[tokio::test]
    async fn typed_data_is_delegated_after_attestation() {
        let server = MockServer::start().await;
        mount_descriptor(&server, 1).await;
        Mock::given(method("POST"))
            .and(path(format!("/api/enclaves/{ENCLAVE}/attestation/verify")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "isValid": true })))
            .expect(1)
            .mount(&server)
            .await;

        let data = sample_typed_data();
        let hash = data.eip712_signing_hash().unwrap();
        let signature = test_key_signer().sign_hash_sync(&hash).unwrap();
        Mock::given(method("POST"))
            .and(path(format!("/api/enclaves/{ENCLAVE}/sign/typed-data")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "signature": alloy::hex::encode_prefixed(signature.as_bytes())
            })))
            .expect(1)
            .mount(&server)
            .await;

        let signer = signer_for(&server, EnclaveSignerConfig::new(ENCLAVE));
        let handle = signer.get_signer(None).await.unwrap();
        let returned = handle.sign_typed_data(&data).await.unwrap();
        assert_eq!(
            returned.recover_address_from_prehash(&hash).unwrap(),
            handle.address()
        );
    }

    #[tokio::test]
    async fn failed_attestation_surfaces_through_handle() {
        let server = MockServer::start().await;
        mount_descriptor(&server, 1).await;
        Mock::given(method("POST"))
            .and(path(format!("/api/enclaves/{ENCLAVE}/attestation/verify")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "isValid": false,
                "verificationDetails": { "reason": "pcr-mismatch" }
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("/api/enclaves/{ENCLAVE}/sign/message")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "signature": "0x" })))
            .expect(0)
            .mount(&server)
            .await;

        let signer = signer_for(&server, EnclaveSignerConfig::new(ENCLAVE));
        let handle = signer.get_signer(None).await.unwrap();
        let err = handle.sign_message(b"pay").await.unwrap_err();
        assert_eq!(err.error_code(), "attestation_error");
        assert!(err.to_string().contains("pcr-mismatch"));
    }
}
