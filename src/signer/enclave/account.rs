// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Local-account-shaped enclave adapter.
//!
//! Mirrors the account interface of client libraries that expect
//! `{ address, type: "local", source }` with hex-returning signing methods,
//! while every signature still comes from the enclave after attestation.

use std::{fmt, str::FromStr, sync::Arc};

use alloy::{
    consensus::{SignableTransaction, TypedTransaction},
    dyn_abi::TypedData,
    hex::FromHexError,
    primitives::{Address, Bytes, Signature},
};
use serde::{Serialize, Serializer};

use super::core::EnclaveSigningCore;
use crate::error::Result;

/// `0x`-prefixed lowercase hex string, kept alongside the bytes it encodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Hex {
    text: String,
    bytes: Bytes,
}

impl Hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> Self {
        Bytes::copy_from_slice(bytes.as_ref()).into()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_bytes(&self) -> Bytes {
        self.bytes.clone()
    }
}

impl FromStr for Hex {
    type Err = FromHexError;

    /// Normalizes to a lowercase `0x`-prefixed string.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        alloy::hex::decode(s.trim()).map(|bytes| Bytes::from(bytes).into())
    }
}

impl Serialize for Hex {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

impl fmt::Display for Hex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl AsRef<str> for Hex {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

impl From<Bytes> for Hex {
    fn from(bytes: Bytes) -> Self {
        Self {
            text: alloy::hex::encode_prefixed(&bytes),
            bytes,
        }
    }
}

impl From<Signature> for Hex {
    fn from(signature: Signature) -> Self {
        Self::encode(signature.as_bytes())
    }
}

/// Message accepted by [`EnclaveAccount::sign_message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignableMessage {
    /// UTF-8 text, signed as its bytes.
    Text(String),
    /// Raw bytes.
    Raw(Bytes),
}

impl SignableMessage {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            SignableMessage::Text(text) => text.as_bytes(),
            SignableMessage::Raw(bytes) => bytes,
        }
    }
}

impl From<&str> for SignableMessage {
    fn from(text: &str) -> Self {
        SignableMessage::Text(text.to_string())
    }
}

impl From<String> for SignableMessage {
    fn from(text: String) -> Self {
        SignableMessage::Text(text)
    }
}

impl From<Bytes> for SignableMessage {
    fn from(bytes: Bytes) -> Self {
        SignableMessage::Raw(bytes)
    }
}

impl From<Vec<u8>> for SignableMessage {
    fn from(bytes: Vec<u8>) -> Self {
        SignableMessage::Raw(bytes.into())
    }
}

impl From<&[u8]> for SignableMessage {
    fn from(bytes: &[u8]) -> Self {
        SignableMessage::Raw(Bytes::copy_from_slice(bytes))
    }
}

/// Account view over an enclave signer.
///
/// Obtained from [`EnclaveSigner::to_account`](super::EnclaveSigner::to_account).
/// Shares the signer's address cache and attestation policy.
#[derive(Debug, Clone)]
pub struct EnclaveAccount {
    core: Arc<EnclaveSigningCore>,
    address: Address,
}

impl EnclaveAccount {
    pub(crate) fn new(core: Arc<EnclaveSigningCore>, address: Address) -> Self {
        Self { core, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Always `"local"`: the account signs without an RPC round trip to a node.
    pub fn account_type(&self) -> &'static str {
        "local"
    }

    pub fn source(&self) -> &'static str {
        "enclave"
    }

    pub fn enclave_id(&self) -> &str {
        self.core.enclave_id()
    }

    pub async fn sign_message(&self, message: impl Into<SignableMessage>) -> Result<Hex> {
        let message = message.into();
        let signature = self.core.sign_message(message.as_bytes()).await?;
        Ok(signature.into())
    }

    /// Returns the serialized signed transaction.
    pub async fn sign_transaction(&self, tx: TypedTransaction) -> Result<Hex> {
        let signed = self.core.sign_transaction(&tx.encoded_for_signing()).await?;
        Ok(signed.into())
    }

    pub async fn sign_typed_data(&self, data: &TypedData) -> Result<Hex> {
        let signature = self.core.sign_typed_data(data).await?;
        Ok(signature.into())
    }
}
