// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Remote enclave platform API.
//!
//! This module provides:
//! - Enclave descriptor lookup (signing address discovery)
//! - Attestation verification
//! - Delegated transaction, message and typed-data signing

pub mod client;
pub mod types;

pub use client::PlatformClient;
pub use types::*;
