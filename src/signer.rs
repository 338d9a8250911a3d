//! Keypair generation, deterministic key ids, and detached RSASSA-PSS-SHA256
//! signatures over the canonical signed bytes.
//!
//! Public keys are encoded as SubjectPublicKeyInfo PEM and private keys as
//! PKCS#1 PEM; the key id is the lowercase hex SHA-256 of the public PEM, so
//! two independent encodings of the same key always agree on identity.

use std::collections::BTreeMap;

use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePublicKey, LineEnding};
use rsa::pss::{BlindedSigningKey, Signature, VerifyingKey};
use rsa::sha2::Sha256;
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::Digest;
use zeroize::Zeroizing;

use crate::document::{PublicKeyRecord, PublicKeyValue};
use crate::error::{RotateError, RotateResult};

/// Key type string recorded in the document and the credential archive.
pub const KEY_TYPE_RSA: &str = "RSA";

/// Signature method string carried on produced document signatures.
pub const SIGNING_METHOD: &str = "rsassa-pss-sha256";

/// Private half of a signing key as it is stored in the credential archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivateKeyRecord {
    pub keytype: String,
    pub keyval: PrivateKeyValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivateKeyValue {
    /// PEM-encoded private key (PKCS#1 or PKCS#8).
    pub private: String,
}

/// A freshly generated signing keypair.
pub struct KeyPair {
    pub public: PublicKeyRecord,
    pub private_pem: Zeroizing<String>,
}

impl KeyPair {
    /// Serialize the public half as a credential archive entry.
    pub fn public_archive_entry(&self) -> RotateResult<Vec<u8>> {
        Ok(serde_json::to_vec(&self.public)?)
    }

    /// Serialize the private half as a credential archive entry.
    pub fn private_archive_entry(&self) -> RotateResult<Vec<u8>> {
        let record = PrivateKeyRecord {
            keytype: KEY_TYPE_RSA.to_string(),
            keyval: PrivateKeyValue {
                private: self.private_pem.as_str().to_string(),
            },
        };
        Ok(serde_json::to_vec(&record)?)
    }
}

/// Parse a credential archive entry back into the private PEM it holds.
pub fn private_pem_from_archive(bytes: &[u8]) -> RotateResult<Zeroizing<String>> {
    let record: PrivateKeyRecord = serde_json::from_slice(bytes)?;
    Ok(Zeroizing::new(record.keyval.private))
}

/// Generate a fresh RSA keypair of the given modulus size.
pub fn generate_keypair(bits: usize) -> RotateResult<KeyPair> {
    let mut rng = rand::rng();
    let private_key = RsaPrivateKey::new(&mut rng, bits)
        .map_err(|e| RotateError::Crypto(format!("RSA key generation failed: {e}")))?;

    let public_pem = private_key
        .to_public_key()
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| RotateError::Crypto(format!("Public key encoding failed: {e}")))?;
    let private_pem = private_key
        .to_pkcs1_pem(LineEnding::LF)
        .map_err(|e| RotateError::Crypto(format!("Private key encoding failed: {e}")))?;

    Ok(KeyPair {
        public: PublicKeyRecord {
            keytype: KEY_TYPE_RSA.to_string(),
            keyval: PublicKeyValue { public: public_pem },
            extra: BTreeMap::new(),
        },
        private_pem,
    })
}

/// Deterministic key identifier: lowercase hex SHA-256 over the public PEM.
pub fn key_id(record: &PublicKeyRecord) -> String {
    let digest = sha2::Sha256::digest(record.keyval.public.as_bytes());
    hex::encode(digest)
}

fn parse_private_pem(pem: &str) -> RotateResult<RsaPrivateKey> {
    // Operator archives hold both vintages: PKCS#1 from this tool, PKCS#8
    // from older exports.
    RsaPrivateKey::from_pkcs1_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
        .map_err(|e| RotateError::Crypto(format!("Invalid RSA private key: {e}")))
}

/// Produce a detached RSASSA-PSS-SHA256 signature over `message`.
pub fn sign(private_pem: &str, message: &[u8]) -> RotateResult<Vec<u8>> {
    let private_key = parse_private_pem(private_pem)?;
    let signing_key = BlindedSigningKey::<Sha256>::new(private_key);
    let mut rng = rand::rng();
    let signature = signing_key
        .try_sign_with_rng(&mut rng, message)
        .map_err(|e| RotateError::Crypto(format!("Signing failed: {e}")))?;
    Ok(signature.to_bytes().as_ref().to_vec())
}

/// Verify a detached signature against a public key record.
///
/// # Errors
/// Returns `Err` only when the public key itself cannot be decoded; a
/// well-formed but non-matching signature yields `Ok(false)`.
pub fn verify(record: &PublicKeyRecord, message: &[u8], signature: &[u8]) -> RotateResult<bool> {
    let public_key = RsaPublicKey::from_public_key_pem(&record.keyval.public)
        .map_err(|e| RotateError::Crypto(format!("Invalid RSA public key: {e}")))?;
    let verifying_key = VerifyingKey::<Sha256>::new(public_key);
    let signature = match Signature::try_from(signature) {
        Ok(sig) => sig,
        Err(_) => return Ok(false),
    };
    Ok(verifying_key.verify(message, &signature).is_ok())
}
