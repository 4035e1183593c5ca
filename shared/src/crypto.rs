// Copyright 2022-2024 Basalt Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT
//! Opaque cryptographic primitives with stable byte-level contracts.
//!
//! The execution core treats these as black boxes: a 32-byte digest, a
//! 65-byte recoverable signature, and a 33-byte compressed public key.

use sha2::{Digest as _, Sha256};
use thiserror::Error;

pub const DIGEST_LENGTH: usize = 32;
pub const SIGNATURE_LENGTH: usize = 65;
pub const PUBLIC_KEY_LENGTH: usize = 33;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("malformed signature")]
    MalformedSignature,
    #[error("malformed public key")]
    MalformedPublicKey,
    #[error("malformed digest")]
    MalformedDigest,
    #[error("signature recovery failed")]
    RecoveryFailed,
}

/// SHA-256 of `data`.
pub fn hash(data: &[u8]) -> [u8; DIGEST_LENGTH] {
    Sha256::digest(data).into()
}

/// The account address for a compressed public key.
pub fn address_of(public_key: &[u8; PUBLIC_KEY_LENGTH]) -> Vec<u8> {
    hash(public_key).to_vec()
}

/// Recover the compressed public key from a 65-byte recoverable signature
/// (recovery id in byte 0, then r || s) over `digest`.
pub fn recover_public_key(
    signature: &[u8],
    digest: &[u8],
) -> Result<[u8; PUBLIC_KEY_LENGTH], CryptoError> {
    if signature.len() != SIGNATURE_LENGTH {
        return Err(CryptoError::MalformedSignature);
    }
    let message =
        libsecp256k1::Message::parse_slice(digest).map_err(|_| CryptoError::MalformedDigest)?;
    let recovery_id = libsecp256k1::RecoveryId::parse(signature[0])
        .map_err(|_| CryptoError::MalformedSignature)?;
    let sig = libsecp256k1::Signature::parse_standard_slice(&signature[1..])
        .map_err(|_| CryptoError::MalformedSignature)?;
    let public_key = libsecp256k1::recover(&message, &sig, &recovery_id)
        .map_err(|_| CryptoError::RecoveryFailed)?;
    Ok(public_key.serialize_compressed())
}

/// Verify a 64-byte (r || s) signature over `digest` against a compressed
/// public key.
pub fn verify_signature(
    public_key: &[u8],
    signature: &[u8],
    digest: &[u8],
) -> Result<bool, CryptoError> {
    let message =
        libsecp256k1::Message::parse_slice(digest).map_err(|_| CryptoError::MalformedDigest)?;
    let key = libsecp256k1::PublicKey::parse_slice(public_key, None)
        .map_err(|_| CryptoError::MalformedPublicKey)?;
    let sig = libsecp256k1::Signature::parse_standard_slice(signature)
        .map_err(|_| CryptoError::MalformedSignature)?;
    Ok(libsecp256k1::verify(&message, &sig, &key))
}

/// Sign `digest` with a 32-byte secret key, producing the 65-byte recoverable
/// form consumed by [`recover_public_key`].
pub fn sign(secret_key: &[u8; 32], digest: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let message =
        libsecp256k1::Message::parse_slice(digest).map_err(|_| CryptoError::MalformedDigest)?;
    let secret = libsecp256k1::SecretKey::parse(secret_key)
        .map_err(|_| CryptoError::MalformedPublicKey)?;
    let (sig, recovery_id) = libsecp256k1::sign(&message, &secret);
    let mut out = Vec::with_capacity(SIGNATURE_LENGTH);
    out.push(recovery_id.serialize());
    out.extend_from_slice(&sig.serialize());
    Ok(out)
}

/// Public key for a secret key. Test and tooling convenience.
pub fn public_key_of(secret_key: &[u8; 32]) -> Result<[u8; PUBLIC_KEY_LENGTH], CryptoError> {
    let secret = libsecp256k1::SecretKey::parse(secret_key)
        .map_err(|_| CryptoError::MalformedPublicKey)?;
    Ok(libsecp256k1::PublicKey::from_secret_key(&secret).serialize_compressed())
}

/// Root of a binary SHA-256 merkle tree over `leaves`. An empty set hashes to
/// the digest of the empty string; odd levels promote the last node.
pub fn merkle_root(leaves: &[Vec<u8>]) -> [u8; DIGEST_LENGTH] {
    if leaves.is_empty() {
        return hash(&[]);
    }
    let mut level: Vec<[u8; DIGEST_LENGTH]> = leaves.iter().map(|l| hash(l)).collect();
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            if pair.len() == 2 {
                let mut buf = [0u8; DIGEST_LENGTH * 2];
                buf[..DIGEST_LENGTH].copy_from_slice(&pair[0]);
                buf[DIGEST_LENGTH..].copy_from_slice(&pair[1]);
                next.push(hash(&buf));
            } else {
                next.push(pair[0]);
            }
        }
        level = next;
    }
    level[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> [u8; 32] {
        let mut k = [0u8; 32];
        k[31] = 1;
        k
    }

    #[test]
    fn sign_recover_round_trip() {
        let digest = hash(b"payload");
        let sig = sign(&test_key(), &digest).unwrap();
        let recovered = recover_public_key(&sig, &digest).unwrap();
        assert_eq!(recovered, public_key_of(&test_key()).unwrap());
    }

    #[test]
    fn verify_accepts_and_rejects() {
        let digest = hash(b"payload");
        let sig = sign(&test_key(), &digest).unwrap();
        let key = public_key_of(&test_key()).unwrap();
        assert!(verify_signature(&key, &sig[1..], &digest).unwrap());
        let other = hash(b"other payload");
        assert!(!verify_signature(&key, &sig[1..], &other).unwrap());
    }

    #[test]
    fn merkle_root_is_stable() {
        let a = merkle_root(&[b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
        let b = merkle_root(&[b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
        assert_eq!(a, b);
        assert_ne!(a, merkle_root(&[b"a".to_vec(), b"b".to_vec()]));
        assert_eq!(merkle_root(&[]), hash(&[]));
    }
}
