//! Root-of-trust rotation for fleet root metadata.
//!
//! This crate mutates a signed root metadata document to replace a role's
//! offline signing key while preserving the automated online key, re-signs
//! the result with a root key already trusted under the prior version, and
//! durably commits the new private key material only after the remote
//! authority has accepted the candidate document.
//!
//! Command-line parsing, HTTP transport, and authentication live in the
//! surrounding tool; it hands this crate a fleet identity, a loaded
//! document, a loaded credential store, and a [`RemoteAuthority`]
//! implementation, and renders the typed error it gets back.

pub mod creds;
pub mod document;
pub mod error;
pub mod logging;
pub mod publish;
pub mod remote;
pub mod rotate;
pub mod signer;

// Re-export the public API
pub use creds::{CredsFile, OfflineCreds};
pub use document::{
    DocumentSignature, PublicKeyRecord, PublicKeyValue, ROLE_ROOT, ROLE_TARGETS, RoleSpec,
    RootDocument, RootSigned,
};
pub use error::{RotateError, RotateResult};
pub use publish::publish_and_commit;
pub use remote::RemoteAuthority;
pub use rotate::{RotationConfig, RotationOutcome, rotate_role_key};
