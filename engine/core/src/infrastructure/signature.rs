// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Ed25519 signing adapter.
//!
//! Signatures are 96 bytes: the signer's 32-byte verifying key followed by
//! the 64-byte Ed25519 signature. The address of a key is the last 20 bytes
//! of `keccak256(verifying_key)`, so recovery is "verify, then hash the key".

use alloy_primitives::{keccak256, Address, Bytes, B256};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

use crate::domain::signature::{MessageSigner, SignatureError, SignatureRecovery};

pub const PUBLIC_KEY_LEN: usize = 32;
pub const SIGNATURE_LEN: usize = PUBLIC_KEY_LEN + 64;

pub fn address_of(key: &VerifyingKey) -> Address {
    Address::from_slice(&keccak256(key.as_bytes())[12..])
}

pub struct Ed25519Signer {
    key: SigningKey,
    address: Address,
}

impl Ed25519Signer {
    pub fn new(key: SigningKey) -> Self {
        let address = address_of(&key.verifying_key());
        Self { key, address }
    }

    pub fn generate() -> Self {
        Self::new(SigningKey::generate(&mut rand_core::OsRng))
    }

    pub fn from_secret_bytes(secret: &[u8]) -> Result<Self, SignatureError> {
        let secret: [u8; 32] = secret.try_into().map_err(|_| {
            SignatureError::SignerUnavailable("Invalid secret key length (must be 32 bytes)".to_string())
        })?;
        Ok(Self::new(SigningKey::from_bytes(&secret)))
    }

    /// Import a base64-encoded 32-byte secret key
    pub fn from_base64(encoded: &str) -> Result<Self, SignatureError> {
        let decoded = STANDARD
            .decode(encoded.trim())
            .map_err(|e| SignatureError::SignerUnavailable(format!("Invalid base64 secret key: {}", e)))?;
        Self::from_secret_bytes(&decoded)
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }
}

#[async_trait]
impl MessageSigner for Ed25519Signer {
    fn address(&self) -> Address {
        self.address
    }

    async fn sign_digest(&self, digest: &B256) -> Result<Bytes, SignatureError> {
        let signature = self.key.sign(digest.as_slice());
        let mut out = Vec::with_capacity(SIGNATURE_LEN);
        out.extend_from_slice(self.key.verifying_key().as_bytes());
        out.extend_from_slice(&signature.to_bytes());
        Ok(Bytes::from(out))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519SignatureRecovery;

impl SignatureRecovery for Ed25519SignatureRecovery {
    fn recover(&self, digest: &B256, signature: &Bytes) -> Result<Address, SignatureError> {
        if signature.len() != SIGNATURE_LEN {
            return Err(SignatureError::Malformed(format!(
                "Invalid signature length {} (must be {} bytes)",
                signature.len(),
                SIGNATURE_LEN
            )));
        }

        let (key_bytes, sig_bytes) = signature.split_at(PUBLIC_KEY_LEN);
        let key_bytes: [u8; PUBLIC_KEY_LEN] = key_bytes
            .try_into()
            .map_err(|_| SignatureError::Malformed("Invalid public key length".to_string()))?;
        let sig_bytes: [u8; 64] = sig_bytes
            .try_into()
            .map_err(|_| SignatureError::Malformed("Invalid signature length".to_string()))?;

        let verifying_key = VerifyingKey::from_bytes(&key_bytes)
            .map_err(|e| SignatureError::Malformed(format!("Invalid public key: {}", e)))?;
        let signature = Signature::from_bytes(&sig_bytes);

        verifying_key
            .verify(digest.as_slice(), &signature)
            .map_err(|e| SignatureError::VerificationFailed(e.to_string()))?;

        Ok(address_of(&verifying_key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sign_and_recover() {
        let signer = Ed25519Signer::generate();
        let digest = keccak256(b"payload");

        let signature = signer.sign_digest(&digest).await.unwrap();
        assert_eq!(signature.len(), SIGNATURE_LEN);

        let recovered = Ed25519SignatureRecovery.recover(&digest, &signature).unwrap();
        assert_eq!(recovered, signer.address());
    }

    #[tokio::test]
    async fn test_tampered_digest_fails() {
        let signer = Ed25519Signer::generate();
        let signature = signer.sign_digest(&keccak256(b"a")).await.unwrap();

        let err = Ed25519SignatureRecovery
            .recover(&keccak256(b"b"), &signature)
            .unwrap_err();
        assert!(matches!(err, SignatureError::VerificationFailed(_)));
    }

    #[test]
    fn test_truncated_signature_is_malformed() {
        let err = Ed25519SignatureRecovery
            .recover(&B256::ZERO, &Bytes::from(vec![0u8; 64]))
            .unwrap_err();
        assert!(matches!(err, SignatureError::Malformed(_)));
    }

    #[test]
    fn test_base64_import_is_deterministic() {
        let encoded = STANDARD.encode([7u8; 32]);
        let a = Ed25519Signer::from_base64(&encoded).unwrap();
        let b = Ed25519Signer::from_secret_bytes(&[7u8; 32]).unwrap();
        assert_eq!(a.address(), b.address());
        assert!(Ed25519Signer::from_base64("AAAA").is_err());
    }
}
