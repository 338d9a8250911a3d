//! Rotation orchestrator: replaces every key in a role except the preserved
//! online key with exactly one freshly generated offline key, then co-signs
//! the mutated document with a root key already trusted under the prior
//! version.
//!
//! This step is pure in-memory transformation. The only collaborator call is
//! the online-key lookup on the injected [`RemoteAuthority`]; no disk writes
//! and no document submission happen here.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use log::info;

use crate::creds::OfflineCreds;
use crate::document::{DocumentSignature, ROLE_ROOT, ROLE_TARGETS, RootDocument};
use crate::error::{RotateError, RotateResult};
use crate::logging::log_rotation_event;
use crate::remote::RemoteAuthority;
use crate::signer;

/// Tunables for a rotation, supplied by the CLI layer.
#[derive(Clone, Debug)]
pub struct RotationConfig {
    /// Role whose offline key is being replaced.
    pub role: String,
    /// RSA modulus size for the new key.
    pub key_bits: usize,
    /// Archive path prefix for the new key's credential entries.
    pub key_path_prefix: String,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            role: ROLE_TARGETS.to_string(),
            key_bits: 2048,
            key_path_prefix: "tufrepo/keys/offline-".to_string(),
        }
    }
}

/// Result of a successful in-memory rotation, ready for the publisher.
#[derive(Debug)]
pub struct RotationOutcome {
    /// Id of the newly generated offline key.
    pub new_key_id: String,
    /// Mutated and re-signed document, version bumped by exactly one.
    pub document: RootDocument,
    /// Full credential store copy including the new key material. Nothing
    /// is persisted until the publisher commits it.
    pub creds: OfflineCreds,
}

/// Rotate the offline key of `config.role`.
///
/// The online key currently served by the authority is preserved; the role
/// ends up with exactly `[preserved, new]` and threshold 1. Threshold 1 is
/// deliberate: either the online automated key or the new offline key alone
/// must be able to authorize future role actions.
pub fn rotate_role_key<A: RemoteAuthority + ?Sized>(
    authority: &A,
    factory: &str,
    config: &RotationConfig,
    mut document: RootDocument,
    creds: &OfflineCreds,
) -> RotateResult<RotationOutcome> {
    // Pre-mutation validation gate: resolve the preserved key before any
    // mutation so a miss leaves the caller's state untouched.
    let online_pub = authority.online_role_key(factory, &config.role)?;
    let preserved_id = document
        .find_key_by_public_value(&config.role, &online_pub.keyval.public)
        .ok_or_else(|| RotateError::NotFound("preserved key not present in role".to_string()))?;
    info!("preserving online {} key {}", config.role, preserved_id);

    // Trust continuity requires a co-signature from a key trusted under the
    // prior version, so the candidate set is the root role's key ids as they
    // stand before the mutation.
    let prior_root_ids: Vec<String> = document
        .signed
        .roles
        .get(ROLE_ROOT)
        .map(|spec| spec.keyids.clone())
        .unwrap_or_default();

    let pair = signer::generate_keypair(config.key_bits)?;
    let new_key_id = signer::key_id(&pair.public);
    log_rotation_event("KEY_GENERATED", &new_key_id, true);

    document.add_key(&new_key_id, pair.public.clone())?;
    document.set_role_keys(
        &config.role,
        vec![preserved_id.clone(), new_key_id.clone()],
        1,
    )?;
    document.bump_version();
    document.validate()?;

    let (signer_id, private_pem) = find_held_root_key(&document, &prior_root_ids, creds)?;
    info!("co-signing version {} with root key {}", document.signed.version, signer_id);

    let payload = document.canonical_signed_bytes()?;
    let signature = signer::sign(&private_pem, &payload)?;
    let signer_record = document.signed.keys.get(&signer_id).ok_or_else(|| {
        RotateError::Verification(format!("root key {signer_id} missing from document keys"))
    })?;
    if !signer::verify(signer_record, &payload, &signature)? {
        return Err(RotateError::Crypto(
            "produced root signature failed self-verification".to_string(),
        ));
    }
    document.replace_signature(DocumentSignature {
        keyid: signer_id,
        method: signer::SIGNING_METHOD.to_string(),
        sig: BASE64.encode(&signature),
    });

    let base = format!("{}{}-{}", config.key_path_prefix, config.role, new_key_id);
    let creds = creds
        .with_entry(&format!("{base}.pub"), pair.public_archive_entry()?)
        .with_entry(&format!("{base}.sec"), pair.private_archive_entry()?);

    Ok(RotationOutcome {
        new_key_id,
        document,
        creds,
    })
}

/// Locate a root key the operator holds private material for, probing the
/// credential store for each candidate id in role order.
fn find_held_root_key(
    document: &RootDocument,
    candidate_ids: &[String],
    creds: &OfflineCreds,
) -> RotateResult<(String, zeroize::Zeroizing<String>)> {
    for keyid in candidate_ids {
        if let Some(entry) = creds.signer_entry(keyid) {
            if !document.signed.keys.contains_key(keyid) {
                continue;
            }
            let pem = signer::private_pem_from_archive(entry)?;
            return Ok((keyid.clone(), pem));
        }
    }
    Err(RotateError::Verification(
        "no held root key can co-sign new version".to_string(),
    ))
}
