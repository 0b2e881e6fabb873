// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Injected browser wallet signer.
//!
//! ## State machine
//!
//! ```text
//! Disconnected ──ensure_connected()──► Connecting ──approved──► Connected
//!      ▲                                   │                        │
//!      └────────── rejected / failed ──────┘                        │
//!      └──────── disconnect() / accountsChanged([]) ────────────────┘
//! ```
//!
//! Account access is a user-facing prompt and may wait indefinitely for
//! approval. Even a connected wallet can revoke access at any time, so every
//! wallet call is treated as fallible.

use std::{
    fmt,
    str::FromStr,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};

use alloy::{
    consensus::TypedTransaction,
    dyn_abi::TypedData,
    primitives::{Address, Bytes, ChainId, Signature},
    providers::DynProvider,
    rpc::types::TransactionRequest,
};
use async_trait::async_trait;
use serde_json::{json, Value};

use super::{
    bind_chain_id, parse_signature, provider_chain_id, SignerKind, SignerProvider, SigningHandle,
};
use crate::error::{Result, SignerError, SigningOperation};

/// Callback registered for wallet events (`accountsChanged`, `chainChanged`).
pub type WalletListener = Arc<dyn Fn(&Value) + Send + Sync>;

/// EIP-1193 provider error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("wallet error {code}: {message}")]
pub struct WalletRpcError {
    pub code: i64,
    pub message: String,
}

impl WalletRpcError {
    /// The user rejected the request.
    pub const USER_REJECTED: i64 = 4001;
    /// The requested account or method has not been authorized.
    pub const UNAUTHORIZED: i64 = 4100;

    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn is_user_rejection(&self) -> bool {
        self.code == Self::USER_REJECTED
    }
}

/// Capability exposed by an injected wallet (EIP-1193).
#[async_trait]
pub trait InjectedWallet: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value, WalletRpcError>;

    fn on(&self, event: &str, listener: WalletListener);

    fn remove_all_listeners(&self);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Default)]
struct Session {
    state: ConnectionState,
    address: Option<Address>,
    chain_id: Option<ChainId>,
    listening: bool,
    /// Bumped by `disconnect()`. A connect attempt only commits if it is unchanged.
    epoch: u64,
}

impl Session {
    fn connected(&self) -> Option<(Address, ChainId)> {
        match (self.state, self.address, self.chain_id) {
            (ConnectionState::Connected, Some(address), Some(chain_id)) => Some((address, chain_id)),
            _ => None,
        }
    }

    fn reset(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.address = None;
        self.chain_id = None;
    }
}

fn lock(session: &Mutex<Session>) -> MutexGuard<'_, Session> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Signer that delegates to a wallet injected into the host environment.
pub struct BrowserWalletSigner {
    wallet: Option<Arc<dyn InjectedWallet>>,
    session: Arc<Mutex<Session>>,
    connect_lock: tokio::sync::Mutex<()>,
}

impl BrowserWalletSigner {
    /// `wallet` is `None` when the host environment has no injected wallet.
    pub fn new(wallet: Option<Arc<dyn InjectedWallet>>) -> Self {
        Self {
            wallet,
            session: Arc::new(Mutex::new(Session::default())),
            connect_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn is_available(&self) -> bool {
        self.wallet.is_some()
    }

    pub fn state(&self) -> ConnectionState {
        lock(&self.session).state
    }

    /// The only transition out of `Disconnected`.
    ///
    /// Concurrent callers share a single account-access prompt.
    pub async fn ensure_connected(&self) -> Result<(Address, ChainId)> {
        let wallet = self.wallet()?;
        if let Some(connected) = lock(&self.session).connected() {
            return Ok(connected);
        }

        let _guard = self.connect_lock.lock().await;
        if let Some(connected) = lock(&self.session).connected() {
            return Ok(connected);
        }

        let epoch = {
            let mut session = lock(&self.session);
            session.state = ConnectionState::Connecting;
            session.epoch
        };
        let result = request_account(wallet.as_ref()).await;

        let mut session = lock(&self.session);
        if session.epoch != epoch {
            tracing::info!("Browser wallet disconnected while connecting, discarding approval");
            return Err(SignerError::Wallet {
                method: "eth_requestAccounts".to_string(),
                message: "connection was cancelled by disconnect".to_string(),
            });
        }
        match result {
            Ok((address, chain_id)) => {
                session.state = ConnectionState::Connected;
                session.address = Some(address);
                session.chain_id = Some(chain_id);
                self.register_listeners(&mut session, wallet.as_ref());
                tracing::info!(%address, chain_id, "Browser wallet connected");
                Ok((address, chain_id))
            }
            Err(e) => {
                session.reset();
                Err(e)
            }
        }
    }

    /// Drop the connection and all wallet event listeners.
    ///
    /// The next use prompts the user for account access again. A connect
    /// attempt still waiting for approval fails instead of completing.
    pub fn disconnect(&self) {
        let mut session = lock(&self.session);
        if let Some(wallet) = &self.wallet {
            wallet.remove_all_listeners();
        }
        session.reset();
        session.listening = false;
        session.epoch = session.epoch.wrapping_add(1);
        tracing::info!("Browser wallet disconnected");
    }

    fn wallet(&self) -> Result<Arc<dyn InjectedWallet>> {
        self.wallet.clone().ok_or_else(|| {
            SignerError::Environment(
                "no wallet available: no injected wallet was found in this environment".to_string(),
            )
        })
    }

    /// Called with the session locked so a concurrent `disconnect()` cannot
    /// interleave between committing the connection and adding listeners.
    fn register_listeners(&self, session: &mut Session, wallet: &dyn InjectedWallet) {
        if session.listening {
            return;
        }
        session.listening = true;

        let weak = Arc::downgrade(&self.session);
        wallet.on(
            "accountsChanged",
            Arc::new(move |payload: &Value| {
                let Some(session) = weak.upgrade() else {
                    return;
                };
                let mut session = lock(&session);
                if payload.as_array().is_some_and(Vec::is_empty) {
                    tracing::info!("Wallet revoked account access");
                    session.reset();
                    return;
                }
                match first_account(payload) {
                    Some(address) if session.state == ConnectionState::Connected => {
                        tracing::info!(%address, "Wallet account changed");
                        session.address = Some(address);
                    }
                    Some(_) => {}
                    None => {
                        tracing::warn!(%payload, "Ignoring malformed accountsChanged payload");
                    }
                }
            }),
        );

        let weak = Arc::downgrade(&self.session);
        wallet.on(
            "chainChanged",
            Arc::new(move |payload: &Value| {
                let Some(session) = weak.upgrade() else {
                    return;
                };
                if let Some(chain_id) = parse_chain_id(payload) {
                    let mut session = lock(&session);
                    if session.state == ConnectionState::Connected {
                        tracing::info!(chain_id, "Wallet chain changed");
                        session.chain_id = Some(chain_id);
                    }
                }
            }),
        );
    }
}

impl fmt::Debug for BrowserWalletSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrowserWalletSigner")
            .field("available", &self.is_available())
            .field("session", &*lock(&self.session))
            .finish()
    }
}

#[async_trait]
impl SignerProvider for BrowserWalletSigner {
    fn kind(&self) -> SignerKind {
        SignerKind::BrowserWallet
    }

    async fn get_signer(&self, provider: Option<&DynProvider>) -> Result<Arc<dyn SigningHandle>> {
        let (address, wallet_chain_id) = self.ensure_connected().await?;
        let chain_id = provider_chain_id(provider).await?.unwrap_or(wallet_chain_id);
        Ok(Arc::new(BrowserSigningHandle {
            wallet: self.wallet()?,
            session: Arc::downgrade(&self.session),
            address,
            chain_id,
        }))
    }

    async fn get_address(&self) -> Result<Address> {
        self.ensure_connected().await.map(|(address, _)| address)
    }
}

async fn request_account(wallet: &dyn InjectedWallet) -> Result<(Address, ChainId)> {
    let accounts = wallet
        .request("eth_requestAccounts", json!([]))
        .await
        .map_err(|e| wallet_error("eth_requestAccounts", SigningOperation::GetAddress, e))?;
    let address = first_account(&accounts).ok_or_else(|| SignerError::Wallet {
        method: "eth_requestAccounts".to_string(),
        message: "wallet returned no accounts".to_string(),
    })?;

    let chain = wallet
        .request("eth_chainId", json!([]))
        .await
        .map_err(|e| wallet_error("eth_chainId", SigningOperation::GetAddress, e))?;
    let chain_id = parse_chain_id(&chain).ok_or_else(|| SignerError::Wallet {
        method: "eth_chainId".to_string(),
        message: format!("unexpected chain id {chain}"),
    })?;

    Ok((address, chain_id))
}

fn wallet_error(method: &str, operation: SigningOperation, err: WalletRpcError) -> SignerError {
    if err.is_user_rejection() {
        SignerError::WalletRejected {
            operation,
            message: err.message,
        }
    } else {
        SignerError::Wallet {
            method: method.to_string(),
            message: err.to_string(),
        }
    }
}

fn first_account(payload: &Value) -> Option<Address> {
    payload
        .as_array()?
        .first()?
        .as_str()
        .and_then(|s| Address::from_str(s).ok())
}

fn parse_chain_id(payload: &Value) -> Option<ChainId> {
    match payload {
        Value::String(s) => match s.strip_prefix("0x") {
            Some(hex) => u64::from_str_radix(hex, 16).ok(),
            None => s.parse().ok(),
        },
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

/// Signing handle that forwards every request to the injected wallet.
#[derive(Clone)]
pub struct BrowserSigningHandle {
    wallet: Arc<dyn InjectedWallet>,
    session: Weak<Mutex<Session>>,
    address: Address,
    chain_id: ChainId,
}

impl BrowserSigningHandle {
    async fn call(&self, method: &str, operation: SigningOperation, params: Value) -> Result<Value> {
        self.wallet.request(method, params).await.map_err(|e| {
            if e.code == WalletRpcError::UNAUTHORIZED {
                if let Some(session) = self.session.upgrade() {
                    lock(&session).reset();
                }
            }
            wallet_error(method, operation, e)
        })
    }

    async fn call_for_signature(
        &self,
        method: &str,
        operation: SigningOperation,
        params: Value,
    ) -> Result<Signature> {
        let value = self.call(method, operation, params).await?;
        let raw = value.as_str().ok_or_else(|| {
            SignerError::InvalidSignature(format!("{method} returned a non-string result"))
        })?;
        parse_signature(raw).map_err(SignerError::InvalidSignature)
    }
}

impl fmt::Debug for BrowserSigningHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrowserSigningHandle")
            .field("address", &self.address)
            .field("chain_id", &self.chain_id)
            .finish()
    }
}

#[async_trait]
impl SigningHandle for BrowserSigningHandle {
    fn address(&self) -> Address {
        self.address
    }

    fn chain_id(&self) -> Option<ChainId> {
        Some(self.chain_id)
    }

    async fn sign_transaction(&self, mut tx: TypedTransaction) -> Result<Bytes> {
        bind_chain_id(&mut tx, Some(self.chain_id))?;
        let request: TransactionRequest = tx.into();
        let request = request.from(self.address);
        let value = self
            .call(
                "eth_signTransaction",
                SigningOperation::SignTransaction,
                json!([request]),
            )
            .await?;

        // Some wallets answer with `{ raw, tx }` instead of the raw hex string.
        let raw = value
            .as_str()
            .or_else(|| value.get("raw").and_then(Value::as_str))
            .ok_or_else(|| SignerError::Wallet {
                method: "eth_signTransaction".to_string(),
                message: "wallet returned no signed transaction".to_string(),
            })?;
        alloy::hex::decode(raw)
            .map(Bytes::from)
            .map_err(|e| SignerError::Wallet {
                method: "eth_signTransaction".to_string(),
                message: format!("signed transaction is not valid hex: {e}"),
            })
    }

    async fn sign_message(&self, message: &[u8]) -> Result<Signature> {
        let params = json!([alloy::hex::encode_prefixed(message), self.address]);
        self.call_for_signature("personal_sign", SigningOperation::SignMessage, params)
            .await
    }

    async fn sign_typed_data(&self, data: &TypedData) -> Result<Signature> {
        let encoded = serde_json::to_string(data)
            .map_err(|e| SignerError::Signing(format!("failed to encode typed data: {e}")))?;
        let params = json!([self.address, encoded]);
        self.call_for_signature("eth_signTypedData_v4", SigningOperation::SignTypedData, params)
            .await
    }
}
