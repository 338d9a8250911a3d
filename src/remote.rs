//! Abstraction over the remote fleet-management authority.
//!
//! The surrounding CLI layer supplies the real HTTP-backed implementation;
//! the rotation flow only ever sees this trait, which keeps the orchestrator
//! and publisher deterministic and network-free under test.

use crate::document::{PublicKeyRecord, RootDocument};
use crate::error::RotateResult;

/// The remote authority holding the served root metadata for a fleet.
pub trait RemoteAuthority {
    /// Fetch the current public key of the automated online signer for
    /// `role`. The returned encoding is comparable byte-for-byte against
    /// the document's key records.
    fn online_role_key(&self, factory: &str, role: &str) -> RotateResult<PublicKeyRecord>;

    /// Fetch the currently served signed root document.
    fn root_get(&self, factory: &str) -> RotateResult<RootDocument>;

    /// Submit a candidate signed root document.
    ///
    /// # Errors
    /// Returns `RotateError::RemoteRejection` carrying the authority's
    /// diagnostic body when the candidate is refused (bad signature, stale
    /// version) or the transport fails. No retry is attempted by callers.
    fn root_post(&self, factory: &str, body: &[u8]) -> RotateResult<()>;
}
