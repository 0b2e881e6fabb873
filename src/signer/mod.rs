// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signer abstraction.
//!
//! Separates *who signs* from *how a transaction is built*. Three variants
//! implement [`SignerProvider`]:
//!
//! - [`LocalSigner`] - raw private key held in process memory
//! - [`BrowserWalletSigner`] - injected EIP-1193 wallet, connected lazily
//! - [`EnclaveSigner`] - remote hardware enclave reached over HTTP, gated on attestation
//!
//! Each produces the same [`SigningHandle`] so callers never branch on the variant.
//! [`AnySigner`] is the tagged union over all three.

pub mod browser;
pub mod enclave;
pub mod local;

use std::{fmt, sync::Arc};

use alloy::{
    consensus::{SignableTransaction, Transaction, TypedTransaction},
    dyn_abi::TypedData,
    primitives::{Address, Bytes, ChainId, Signature},
    providers::{DynProvider, Provider},
};
use async_trait::async_trait;

pub use browser::{BrowserWalletSigner, ConnectionState, InjectedWallet, WalletListener, WalletRpcError};
pub use enclave::{EnclaveAccount, EnclaveSigner, EnclaveSignerConfig, Hex, SignableMessage};
pub use local::LocalSigner;

use crate::config::{RuntimeEnvironment, SignerSettings};
use crate::error::{Result, SignerError};
use crate::platform::PlatformClient;

/// Discriminator reported by every signer variant for logs and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignerKind {
    Local,
    BrowserWallet,
    Enclave,
}

impl SignerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignerKind::Local => "local",
            SignerKind::BrowserWallet => "browser-wallet",
            SignerKind::Enclave => "enclave",
        }
    }
}

impl fmt::Display for SignerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A connected handle able to produce signatures for one address.
#[async_trait]
pub trait SigningHandle: fmt::Debug + Send + Sync {
    fn address(&self) -> Address;

    /// Chain id the handle is bound to, if any.
    fn chain_id(&self) -> Option<ChainId>;

    /// Sign a transaction and return its EIP-2718 encoded signed envelope.
    ///
    /// If the handle is bound to a chain, a missing chain id is filled in
    /// and a conflicting one is rejected.
    async fn sign_transaction(&self, tx: TypedTransaction) -> Result<Bytes>;

    /// EIP-191 personal message signature.
    async fn sign_message(&self, message: &[u8]) -> Result<Signature>;

    /// EIP-712 typed data signature.
    async fn sign_typed_data(&self, data: &TypedData) -> Result<Signature>;
}

/// The signer capability every variant implements.
#[async_trait]
pub trait SignerProvider: Send + Sync {
    fn kind(&self) -> SignerKind;

    /// Produce a signing handle, optionally bound to the provider's chain.
    ///
    /// Safe to call repeatedly.
    async fn get_signer(&self, provider: Option<&DynProvider>) -> Result<Arc<dyn SigningHandle>>;

    /// The address this signer represents. Memoized per variant.
    async fn get_address(&self) -> Result<Address>;
}

/// Tagged union over the three signer variants.
pub enum AnySigner {
    Local(LocalSigner),
    BrowserWallet(BrowserWalletSigner),
    Enclave(EnclaveSigner),
}

impl AnySigner {
    /// Build the signer described by `settings`.
    ///
    /// `platform` is only needed for enclave signers and `wallet` only for
    /// browser-wallet signers.
    pub fn from_settings(
        settings: SignerSettings,
        platform: Option<&PlatformClient>,
        wallet: Option<Arc<dyn InjectedWallet>>,
        runtime: RuntimeEnvironment,
    ) -> Result<Self> {
        match settings {
            SignerSettings::Local { private_key } => Ok(AnySigner::Local(
                LocalSigner::with_runtime(&private_key, runtime)?,
            )),
            SignerSettings::BrowserWallet => {
                Ok(AnySigner::BrowserWallet(BrowserWalletSigner::new(wallet)))
            }
            SignerSettings::Enclave {
                enclave_id,
                verify_attestation,
                attestation_nonce,
                allow_unverified_in_production,
            } => {
                let platform = platform.ok_or_else(|| {
                    SignerError::Configuration(
                        "an enclave signer requires a platform client".to_string(),
                    )
                })?;
                let config = EnclaveSignerConfig {
                    enclave_id,
                    verify_attestation,
                    attestation_nonce,
                    allow_unverified_in_production,
                };
                Ok(AnySigner::Enclave(EnclaveSigner::with_runtime(
                    platform.clone(),
                    config,
                    runtime,
                )?))
            }
        }
    }

    fn inner(&self) -> &dyn SignerProvider {
        match self {
            AnySigner::Local(signer) => signer,
            AnySigner::BrowserWallet(signer) => signer,
            AnySigner::Enclave(signer) => signer,
        }
    }
}

#[async_trait]
impl SignerProvider for AnySigner {
    fn kind(&self) -> SignerKind {
        self.inner().kind()
    }

    async fn get_signer(&self, provider: Option<&DynProvider>) -> Result<Arc<dyn SigningHandle>> {
        self.inner().get_signer(provider).await
    }

    async fn get_address(&self) -> Result<Address> {
        self.inner().get_address().await
    }
}

impl From<LocalSigner> for AnySigner {
    fn from(signer: LocalSigner) -> Self {
        AnySigner::Local(signer)
    }
}

impl From<BrowserWalletSigner> for AnySigner {
    fn from(signer: BrowserWalletSigner) -> Self {
        AnySigner::BrowserWallet(signer)
    }
}

impl From<EnclaveSigner> for AnySigner {
    fn from(signer: EnclaveSigner) -> Self {
        AnySigner::Enclave(signer)
    }
}

/// Chain id of the optional network connection passed to `get_signer`.
pub(crate) async fn provider_chain_id(provider: Option<&DynProvider>) -> Result<Option<ChainId>> {
    let Some(provider) = provider else {
        return Ok(None);
    };
    provider
        .get_chain_id()
        .await
        .map(Some)
        .map_err(|e| SignerError::Provider(format!("failed to read chain id: {e}")))
}

/// Fill in the bound chain id, rejecting a transaction built for another chain.
pub(crate) fn bind_chain_id(tx: &mut TypedTransaction, chain_id: Option<ChainId>) -> Result<()> {
    let Some(chain_id) = chain_id else {
        return Ok(());
    };
    let previous = tx.chain_id();
    if !tx.set_chain_id_checked(chain_id) {
        return Err(SignerError::Configuration(format!(
            "transaction chain id {} does not match signer chain id {chain_id}",
            previous.unwrap_or_default()
        )));
    }
    Ok(())
}

/// Parse a 65-byte hex signature (`r || s || v`).
pub(crate) fn parse_signature(raw: &str) -> std::result::Result<Signature, String> {
    let bytes = alloy::hex::decode(raw.trim())
        .map_err(|e| format!("signature is not valid hex: {e}"))?;
    Signature::from_raw(&bytes).map_err(|e| format!("malformed signature: {e}"))
}
