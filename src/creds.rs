//! Offline credential store: the named collection of key-material blobs an
//! operator keeps outside the remote authority.
//!
//! The in-memory store is an ordered map of archive path to raw bytes and is
//! only ever updated immutably (`with_entry`), so the commit step stays
//! all-or-nothing. On disk the store is a single gzip-compressed JSON
//! archive; it is read wholesale at the start of a rotation and written
//! wholesale (temp file plus rename) at commit.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use log::debug;

use crate::error::{RotateError, RotateResult};

/// In-memory mapping of archive path to key-material bytes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OfflineCreds {
    entries: BTreeMap<String, Vec<u8>>,
}

impl OfflineCreds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a new store with one entry added or replaced.
    pub fn with_entry(&self, path: &str, bytes: Vec<u8>) -> Self {
        let mut entries = self.entries.clone();
        entries.insert(path.to_string(), bytes);
        Self { entries }
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.entries.get(path).map(Vec::as_slice)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Probe for the private-material entry belonging to `key_id`, if this
    /// store holds one. Private entries end in `<key id>.sec`.
    pub fn signer_entry(&self, key_id: &str) -> Option<&[u8]> {
        let suffix = format!("{key_id}.sec");
        self.entries
            .iter()
            .find(|(path, _)| path.ends_with(&suffix))
            .map(|(_, bytes)| bytes.as_slice())
    }

    /// Decode an archive. The map is fully decoded before the store is
    /// constructed, so a malformed archive never yields a partial store.
    pub fn from_archive_bytes(bytes: &[u8]) -> RotateResult<Self> {
        let mut decoder = GzDecoder::new(bytes);
        let mut body = Vec::new();
        decoder
            .read_to_end(&mut body)
            .map_err(|e| RotateError::Store(format!("credential archive is not valid gzip: {e}")))?;

        let encoded: BTreeMap<String, String> = serde_json::from_slice(&body)
            .map_err(|e| RotateError::Store(format!("credential archive body is malformed: {e}")))?;

        let mut entries = BTreeMap::new();
        for (path, value) in encoded {
            let raw = BASE64.decode(value.as_bytes()).map_err(|e| {
                RotateError::Store(format!("credential entry {path} is not valid base64: {e}"))
            })?;
            entries.insert(path, raw);
        }
        Ok(Self { entries })
    }

    /// Encode the store as archive bytes.
    pub fn to_archive_bytes(&self) -> RotateResult<Vec<u8>> {
        let encoded: BTreeMap<&str, String> = self
            .entries
            .iter()
            .map(|(path, bytes)| (path.as_str(), BASE64.encode(bytes)))
            .collect();
        let body = serde_json::to_vec(&encoded)?;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&body)
            .map_err(|e| RotateError::Store(format!("credential archive encoding failed: {e}")))?;
        encoder
            .finish()
            .map_err(|e| RotateError::Store(format!("credential archive encoding failed: {e}")))
    }
}

/// Persistence handle for the on-disk credential archive.
///
/// `load` reads the whole archive; `stage` writes a candidate copy to an
/// adjacent temp file; `commit` atomically renames it over the original.
/// A crash before `commit` leaves the original byte-for-byte intact.
#[derive(Debug, Clone)]
pub struct CredsFile {
    path: PathBuf,
}

impl CredsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }

    /// Read and decode the archive.
    pub fn load(&self) -> RotateResult<OfflineCreds> {
        let bytes = fs::read(&self.path).map_err(|e| {
            RotateError::Store(format!(
                "unable to read credential archive {}: {e}",
                self.path.display()
            ))
        })?;
        let creds = OfflineCreds::from_archive_bytes(&bytes)?;
        debug!(
            "loaded {} credential entries from {}",
            creds.len(),
            self.path.display()
        );
        Ok(creds)
    }

    /// Write a candidate archive next to the real one and return its path.
    ///
    /// Only called after the remote authority has accepted the new root, so
    /// a failure here is already a degraded commit, not a clean abort.
    pub fn stage(&self, creds: &OfflineCreds) -> RotateResult<PathBuf> {
        let temp = self.temp_path();
        let bytes = creds.to_archive_bytes()?;
        fs::write(&temp, bytes).map_err(|e| RotateError::Commit {
            temp_path: temp.clone(),
            reason: format!("unable to write staged archive: {e}"),
        })?;
        debug!("staged candidate credential archive at {}", temp.display());
        Ok(temp)
    }

    /// Atomically rename the staged archive over the original.
    pub fn commit(&self, temp: &Path) -> RotateResult<()> {
        fs::rename(temp, &self.path).map_err(|e| RotateError::Commit {
            temp_path: temp.to_path_buf(),
            reason: format!("rename over {} failed: {e}", self.path.display()),
        })
    }
}
