// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Local private-key signer.
//!
//! Keys live in process memory, so using this variant in production is
//! discouraged with a one-time warning per signer instance. The warning is
//! advisory only and never blocks signing.

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use alloy::{
    consensus::{SignableTransaction, TxEnvelope, TypedTransaction},
    dyn_abi::TypedData,
    eips::eip2718::Encodable2718,
    network::TxSignerSync,
    primitives::{Address, Bytes, ChainId, Signature},
    providers::DynProvider,
    signers::{local::PrivateKeySigner, Signer, SignerSync},
};
use async_trait::async_trait;
use k256::{ecdsa::SigningKey, SecretKey};

use super::{bind_chain_id, provider_chain_id, SignerKind, SignerProvider, SigningHandle};
use crate::config::RuntimeEnvironment;
use crate::error::{Result, SignerError};

/// Signer backed by a raw secp256k1 key.
pub struct LocalSigner {
    signer: PrivateKeySigner,
    runtime: RuntimeEnvironment,
    warned: AtomicBool,
}

impl LocalSigner {
    /// Create a signer from a hex private key, detecting the runtime environment.
    pub fn new(private_key: &str) -> Result<Self> {
        Self::with_runtime(private_key, RuntimeEnvironment::detect())
    }

    /// Create a signer from a hex private key (with or without `0x`).
    pub fn with_runtime(private_key: &str, runtime: RuntimeEnvironment) -> Result<Self> {
        let trimmed = private_key.trim();
        if trimmed.is_empty() {
            return Err(SignerError::Configuration(
                "a private key is required for the local signer".to_string(),
            ));
        }

        let key_bytes = alloy::hex::decode(trimmed)
            .map_err(|e| SignerError::Configuration(format!("invalid private key: {e}")))?;
        let signer = PrivateKeySigner::from_slice(&key_bytes)
            .map_err(|e| SignerError::Configuration(format!("invalid private key: {e}")))?;

        Ok(Self::from_signer(signer, runtime))
    }

    /// Create a signer from a SEC1 or PKCS#8 PEM-encoded key.
    pub fn from_pem(pem_bytes: &[u8], runtime: RuntimeEnvironment) -> Result<Self> {
        let secret_key = secret_key_from_pem(pem_bytes)?;
        let signer = PrivateKeySigner::from_signing_key(SigningKey::from(secret_key));
        Ok(Self::from_signer(signer, runtime))
    }

    pub fn from_signer(signer: PrivateKeySigner, runtime: RuntimeEnvironment) -> Self {
        Self {
            signer,
            runtime,
            warned: AtomicBool::new(false),
        }
    }

    /// The derived address. Never touches the network.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    fn warn_if_production(&self) {
        if !self.runtime.is_production() {
            return;
        }
        if self
            .warned
            .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
        {
            tracing::warn!(
                address = %self.signer.address(),
                "Local private-key signer used in production; prefer an enclave signer"
            );
        }
    }
}

impl fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSigner")
            .field("address", &self.signer.address())
            .field("runtime", &self.runtime)
            .finish()
    }
}

#[async_trait]
impl SignerProvider for LocalSigner {
    fn kind(&self) -> SignerKind {
        SignerKind::Local
    }

    async fn get_signer(&self, provider: Option<&DynProvider>) -> Result<Arc<dyn SigningHandle>> {
        self.warn_if_production();
        let chain_id = provider_chain_id(provider).await?;
        let mut signer = self.signer.clone();
        signer.set_chain_id(chain_id);
        Ok(Arc::new(LocalSigningHandle { signer }))
    }

    async fn get_address(&self) -> Result<Address> {
        self.warn_if_production();
        Ok(self.signer.address())
    }
}

/// Signing handle over an in-memory key.
#[derive(Debug, Clone)]
pub struct LocalSigningHandle {
    signer: PrivateKeySigner,
}

#[async_trait]
impl SigningHandle for LocalSigningHandle {
    fn address(&self) -> Address {
        self.signer.address()
    }

    fn chain_id(&self) -> Option<ChainId> {
        Signer::chain_id(&self.signer)
    }

    async fn sign_transaction(&self, mut tx: TypedTransaction) -> Result<Bytes> {
        bind_chain_id(&mut tx, Signer::chain_id(&self.signer))?;
        let signature = self
            .signer
            .sign_transaction_sync(&mut tx)
            .map_err(|e| SignerError::Signing(e.to_string()))?;
        let envelope = TxEnvelope::from(tx.into_signed(signature));
        Ok(envelope.encoded_2718().into())
    }

    async fn sign_message(&self, message: &[u8]) -> Result<Signature> {
        self.signer
            .sign_message_sync(message)
            .map_err(|e| SignerError::Signing(e.to_string()))
    }

    async fn sign_typed_data(&self, data: &TypedData) -> Result<Signature> {
        let hash = data
            .eip712_signing_hash()
            .map_err(|e| SignerError::Signing(format!("invalid typed data: {e}")))?;
        self.signer
            .sign_hash_sync(&hash)
            .map_err(|e| SignerError::Signing(e.to_string()))
    }
}

/// Parse a PEM private key, accepting SEC1 (`EC PRIVATE KEY`) or PKCS#8 (`PRIVATE KEY`).
fn secret_key_from_pem(pem_bytes: &[u8]) -> Result<SecretKey> {
    let pem_str = std::str::from_utf8(pem_bytes)
        .map_err(|e| SignerError::Configuration(format!("invalid PEM encoding: {e}")))?;

    let pem = pem::parse(pem_str)
        .map_err(|e| SignerError::Configuration(format!("invalid PEM: {e}")))?;

    SecretKey::from_sec1_der(pem.contents())
        .or_else(|_| {
            use k256::pkcs8::DecodePrivateKey;
            SecretKey::from_pkcs8_der(pem.contents())
        })
        .map_err(|e| SignerError::Configuration(format!("invalid key format: {e}")))
}
