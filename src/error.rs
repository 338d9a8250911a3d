use std::path::PathBuf;

/// Error taxonomy for the rotation flow.
///
/// Everything before remote submission fails closed: no document mutation is
/// visible and the on-disk credential archive is untouched. `Commit` is the
/// one asymmetric case - the remote authority has already accepted the new
/// root, so the error carries the staged file's location for manual recovery
/// instead of pretending the operation can be rolled back.
#[derive(Debug, thiserror::Error)]
pub enum RotateError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Crypto error: {0}")]
    Crypto(String),
    #[error("Verification error: {0}")]
    Verification(String),
    #[error("Remote authority rejected the candidate root:\n{0}")]
    RemoteRejection(String),
    #[error("Credential store error: {0}")]
    Store(String),
    #[error(
        "Unable to update credential archive: {reason}. The remote root has \
         already been accepted and cannot be rolled back. A complete copy of \
         the new archive is staged at {path}; move it over the original to \
         finish the rotation.",
        path = .temp_path.display()
    )]
    Commit { temp_path: PathBuf, reason: String },
    #[error("Document integrity error: {0}")]
    Document(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type RotateResult<T> = Result<T, RotateError>;
