// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Signing capability boundary. The engine never implements a signature
//! scheme itself; it asks a [`MessageSigner`] for signatures and a
//! [`SignatureRecovery`] for the address behind one.

use alloy_primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("Malformed signature: {0}")]
    Malformed(String),

    #[error("Signature verification failed: {0}")]
    VerificationFailed(String),

    #[error("Signer unavailable: {0}")]
    SignerUnavailable(String),
}

/// Produces signatures over payload digests (wallet, HSM, local key).
#[async_trait]
pub trait MessageSigner: Send + Sync {
    fn address(&self) -> Address;

    async fn sign_digest(&self, digest: &B256) -> Result<Bytes, SignatureError>;
}

/// Recovers the address that produced `signature` over `digest`.
pub trait SignatureRecovery: Send + Sync {
    fn recover(&self, digest: &B256, signature: &Bytes) -> Result<Address, SignatureError>;
}
