//! Publisher / committer: submits the candidate root document and, only on
//! acceptance, commits the updated credential archive to durable storage.
//!
//! Failure semantics are deliberately asymmetric. Before the upload succeeds
//! everything fails closed and the on-disk archive stays byte-for-byte
//! unchanged. Once the authority accepts the new root the operation cannot
//! be rolled back server-side, so a local commit failure is reported loudly
//! with the staged file's location instead of being treated as a clean abort.

use log::{error, info};

use crate::creds::{CredsFile, OfflineCreds};
use crate::document::RootDocument;
use crate::error::RotateResult;
use crate::logging::log_rotation_event;
use crate::remote::RemoteAuthority;

/// Upload `document` for `factory` and, on acceptance, atomically replace
/// the credential archive with `updated_creds`.
///
/// No retry is attempted on rejection; the caller must re-run the whole
/// rotation from a freshly fetched document.
pub fn publish_and_commit<A: RemoteAuthority + ?Sized>(
    authority: &A,
    factory: &str,
    document: &RootDocument,
    creds_file: &CredsFile,
    updated_creds: &OfflineCreds,
) -> RotateResult<()> {
    let body = document.to_json()?;

    info!("uploading root version {}", document.signed.version);
    if let Err(rejection) = authority.root_post(factory, &body) {
        log_rotation_event("ROOT_UPLOAD", &rejection.to_string(), false);
        return Err(rejection);
    }
    log_rotation_event(
        "ROOT_UPLOAD",
        &format!("version {}", document.signed.version),
        true,
    );

    // The remote side has advanced; everything past this point is commit.
    let temp = creds_file.stage(updated_creds)?;
    match creds_file.commit(&temp) {
        Ok(()) => {
            info!("credential archive updated at {}", creds_file.path().display());
            Ok(())
        }
        Err(e) => {
            error!(
                "credential archive commit failed; staged copy left at {}",
                temp.display()
            );
            Err(e)
        }
    }
}
