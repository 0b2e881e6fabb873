// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Enclave Signer - pluggable transaction signing for EVM chains
//!
//! Callers ask a [`SignerProvider`] for a [`SigningHandle`] and sign with it,
//! without knowing whether the key is a local private key, an injected
//! browser wallet or a remote hardware enclave.
//!
//! ## Modules
//!
//! - `signer` - signer variants, the signing handle and the tagged union
//! - `platform` - HTTP client for the enclave platform API
//! - `config` - runtime environment, platform and signer settings
//! - `error` - error taxonomy shared by all signers
//! - `logging` - tracing subscriber setup

pub mod config;
pub mod error;
pub mod logging;
pub mod platform;
pub mod signer;

pub use config::{PlatformConfig, RuntimeEnvironment, SignerSettings};
pub use error::{Result, SignerError, SigningOperation, TransportError};
pub use platform::PlatformClient;
pub use signer::{
    AnySigner, BrowserWalletSigner, EnclaveAccount, EnclaveSigner, EnclaveSignerConfig,
    LocalSigner, SignerKind, SignerProvider, SigningHandle,
};
