// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signer backed by a remote hardware enclave.
//!
//! The private key is generated and held inside the enclave. Before each
//! signing call the enclave's attestation is verified through the platform
//! API (unless explicitly disabled), and a failed verification aborts the
//! call before any signing request is sent.

mod account;
mod core;
mod signer;

pub use account::{EnclaveAccount, Hex, SignableMessage};
pub use self::core::EnclaveSignerConfig;
pub use signer::{EnclaveSigner, EnclaveSigningHandle};
