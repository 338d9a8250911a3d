//! Typed model of the signed root metadata document.
//!
//! The document is round-trip faithful: fields this flow does not understand
//! are kept in open `#[serde(flatten)]` maps so re-serializing a document we
//! only partially model never drops data. All keyed maps are `BTreeMap` so
//! the canonical signed encoding is deterministic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{RotateError, RotateResult};

/// Role holding the keys that sign the root document itself.
pub const ROLE_ROOT: &str = "root";
/// Role holding the keys that sign deployable content.
pub const ROLE_TARGETS: &str = "targets";

/// Public half of a signing key as it appears in `signed.keys`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicKeyRecord {
    pub keytype: String,
    pub keyval: PublicKeyValue,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicKeyValue {
    /// PEM-encoded SubjectPublicKeyInfo.
    pub public: String,
}

/// Key set and signature threshold for one role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleSpec {
    pub keyids: Vec<String>,
    pub threshold: u32,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Detached signature over the canonical encoding of `signed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSignature {
    pub keyid: String,
    pub method: String,
    /// Base64 signature value.
    pub sig: String,
}

/// The signed portion of the root document. This is the exact byte source
/// for signing and verification, so field order here is load-bearing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootSigned {
    pub keys: BTreeMap<String, PublicKeyRecord>,
    pub roles: BTreeMap<String, RoleSpec>,
    pub version: u64,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Top-level signed root metadata: payload plus detached signatures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootDocument {
    pub signed: RootSigned,
    pub signatures: Vec<DocumentSignature>,
}

impl RootDocument {
    /// Parse a document from its JSON encoding.
    pub fn from_json(bytes: &[u8]) -> RotateResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Serialize the full document (signed section plus signatures) for
    /// submission to the remote authority.
    pub fn to_json(&self) -> RotateResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Deterministic encoding of the `signed` section only. These bytes are
    /// what gets signed and what any verifier must reproduce independently.
    pub fn canonical_signed_bytes(&self) -> RotateResult<Vec<u8>> {
        Ok(serde_json::to_vec(&self.signed)?)
    }

    /// Scan a role's key ids for one whose stored public encoding matches
    /// `public_pem` exactly. Returns the first match.
    pub fn find_key_by_public_value(&self, role: &str, public_pem: &str) -> Option<String> {
        let spec = self.signed.roles.get(role)?;
        for keyid in &spec.keyids {
            if let Some(record) = self.signed.keys.get(keyid) {
                if record.keyval.public == public_pem {
                    return Some(keyid.clone());
                }
            }
        }
        None
    }

    /// Insert a key record under `keyid`. Inserting the identical record
    /// twice is a no-op; inserting a different record under an existing id
    /// is a hash-collision integrity failure and is refused.
    pub fn add_key(&mut self, keyid: &str, record: PublicKeyRecord) -> RotateResult<()> {
        if let Some(existing) = self.signed.keys.get(keyid) {
            if *existing == record {
                return Ok(());
            }
            return Err(RotateError::Document(format!(
                "key id {keyid} already present with a different public encoding"
            )));
        }
        self.signed.keys.insert(keyid.to_string(), record);
        Ok(())
    }

    /// Replace a role's key list and threshold atomically.
    pub fn set_role_keys(
        &mut self,
        role: &str,
        keyids: Vec<String>,
        threshold: u32,
    ) -> RotateResult<()> {
        if threshold < 1 {
            return Err(RotateError::Document(format!(
                "threshold for role {role} must be at least 1"
            )));
        }
        if threshold as usize > keyids.len() {
            return Err(RotateError::Document(format!(
                "threshold {threshold} exceeds the {} key(s) assigned to role {role}",
                keyids.len()
            )));
        }
        for keyid in &keyids {
            if !self.signed.keys.contains_key(keyid) {
                return Err(RotateError::Document(format!(
                    "role {role} references unknown key id {keyid}"
                )));
            }
        }
        let entry = self
            .signed
            .roles
            .entry(role.to_string())
            .or_insert_with(|| RoleSpec {
                keyids: Vec::new(),
                threshold: 1,
                extra: BTreeMap::new(),
            });
        entry.keyids = keyids;
        entry.threshold = threshold;
        Ok(())
    }

    pub fn bump_version(&mut self) {
        self.signed.version += 1;
    }

    /// Append a signature, replacing any prior entry by the same key id.
    /// Key ids never repeat in the signature list.
    pub fn replace_signature(&mut self, signature: DocumentSignature) {
        self.signatures.retain(|s| s.keyid != signature.keyid);
        self.signatures.push(signature);
    }

    /// Check the document's referential invariants: every role key id must
    /// resolve in `signed.keys` and every threshold must be satisfiable.
    pub fn validate(&self) -> RotateResult<()> {
        for (role, spec) in &self.signed.roles {
            if spec.threshold < 1 {
                return Err(RotateError::Document(format!(
                    "role {role} has threshold {}",
                    spec.threshold
                )));
            }
            if spec.threshold as usize > spec.keyids.len() {
                return Err(RotateError::Document(format!(
                    "role {role} threshold {} exceeds its {} key(s)",
                    spec.threshold,
                    spec.keyids.len()
                )));
            }
            for keyid in &spec.keyids {
                if !self.signed.keys.contains_key(keyid) {
                    return Err(RotateError::Document(format!(
                        "role {role} references unknown key id {keyid}"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(public: &str) -> PublicKeyRecord {
        PublicKeyRecord {
            keytype: "RSA".to_string(),
            keyval: PublicKeyValue {
                public: public.to_string(),
            },
            extra: BTreeMap::new(),
        }
    }

    fn sample_doc() -> RootDocument {
        let mut keys = BTreeMap::new();
        keys.insert("aaa".to_string(), record("PEM-A"));
        keys.insert("bbb".to_string(), record("PEM-B"));
        let mut roles = BTreeMap::new();
        roles.insert(
            ROLE_TARGETS.to_string(),
            RoleSpec {
                keyids: vec!["aaa".to_string(), "bbb".to_string()],
                threshold: 2,
                extra: BTreeMap::new(),
            },
        );
        RootDocument {
            signed: RootSigned {
                keys,
                roles,
                version: 3,
                extra: BTreeMap::new(),
            },
            signatures: Vec::new(),
        }
    }

    #[test]
    fn find_key_matches_on_exact_public_encoding() {
        let doc = sample_doc();
        assert_eq!(
            doc.find_key_by_public_value(ROLE_TARGETS, "PEM-B"),
            Some("bbb".to_string())
        );
        assert_eq!(doc.find_key_by_public_value(ROLE_TARGETS, "PEM-X"), None);
        assert_eq!(doc.find_key_by_public_value("snapshot", "PEM-A"), None);
    }

    #[test]
    fn add_key_is_idempotent_for_identical_records() {
        let mut doc = sample_doc();
        doc.add_key("aaa", record("PEM-A")).unwrap();
        assert_eq!(doc.signed.keys.len(), 2);
    }

    #[test]
    fn add_key_refuses_collisions() {
        let mut doc = sample_doc();
        let err = doc.add_key("aaa", record("PEM-OTHER")).unwrap_err();
        assert!(matches!(err, RotateError::Document(_)));
    }

    #[test]
    fn set_role_keys_validates_threshold() {
        let mut doc = sample_doc();
        let err = doc
            .set_role_keys(ROLE_TARGETS, vec!["aaa".to_string()], 0)
            .unwrap_err();
        assert!(matches!(err, RotateError::Document(_)));

        let err = doc
            .set_role_keys(ROLE_TARGETS, vec!["aaa".to_string()], 2)
            .unwrap_err();
        assert!(matches!(err, RotateError::Document(_)));

        doc.set_role_keys(ROLE_TARGETS, vec!["aaa".to_string(), "bbb".to_string()], 1)
            .unwrap();
        assert_eq!(doc.signed.roles[ROLE_TARGETS].threshold, 1);
    }

    #[test]
    fn set_role_keys_refuses_unknown_ids() {
        let mut doc = sample_doc();
        let err = doc
            .set_role_keys(ROLE_TARGETS, vec!["zzz".to_string()], 1)
            .unwrap_err();
        assert!(matches!(err, RotateError::Document(_)));
    }

    #[test]
    fn replace_signature_keeps_keyids_unique() {
        let mut doc = sample_doc();
        doc.replace_signature(DocumentSignature {
            keyid: "aaa".to_string(),
            method: "rsassa-pss-sha256".to_string(),
            sig: "first".to_string(),
        });
        doc.replace_signature(DocumentSignature {
            keyid: "aaa".to_string(),
            method: "rsassa-pss-sha256".to_string(),
            sig: "second".to_string(),
        });
        assert_eq!(doc.signatures.len(), 1);
        assert_eq!(doc.signatures[0].sig, "second");
    }

    #[test]
    fn canonical_bytes_are_deterministic() {
        let doc = sample_doc();
        let first = doc.canonical_signed_bytes().unwrap();
        let second = doc.clone().canonical_signed_bytes().unwrap();
        assert_eq!(first, second);
        // Compact encoding, no whitespace variance.
        assert!(!first.contains(&b'\n'));
    }

    #[test]
    fn unknown_fields_survive_a_round_trip() {
        let json = br#"{
            "signed": {
                "_type": "Root",
                "expires": "2027-01-01T00:00:00Z",
                "keys": {"aaa": {"keytype": "RSA", "keyval": {"public": "PEM-A"}, "scheme": "rsassa-pss-sha256"}},
                "roles": {"targets": {"keyids": ["aaa"], "threshold": 1, "paths": ["*"]}},
                "version": 7,
                "consistent_snapshot": false
            },
            "signatures": []
        }"#;
        let doc = RootDocument::from_json(json).unwrap();
        assert_eq!(doc.signed.version, 7);
        assert_eq!(doc.signed.extra["_type"], "Root");
        assert_eq!(doc.signed.roles[ROLE_TARGETS].extra["paths"][0], "*");
        assert_eq!(
            doc.signed.keys["aaa"].extra["scheme"],
            "rsassa-pss-sha256"
        );

        let reencoded = doc.to_json().unwrap();
        let reparsed = RootDocument::from_json(&reencoded).unwrap();
        assert_eq!(doc, reparsed);
    }

    #[test]
    fn validate_catches_dangling_role_keys() {
        let mut doc = sample_doc();
        doc.validate().unwrap();
        doc.signed.keys.remove("bbb");
        assert!(doc.validate().is_err());
    }
}
