//! Persisted stack snapshots and their binary codec.
//!
//! A snapshot is the ordered list of `(compatibility key, view-state blob)`
//! pairs for the whole stack. The wire form is postcard: sequence lengths
//! are encoded explicitly as varints, never recovered by delimiter scanning,
//! so empty and variable-length stacks round-trip exactly.

use std::fmt;

use serde::{Deserialize, Serialize};

use scrim_core::CompatibilityKey;

/// One surface's persisted state, indexed by its compatibility key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedEntry {
    pub key: CompatibilityKey,
    pub view_state: Vec<u8>,
}

impl PersistedEntry {
    pub fn new(key: CompatibilityKey, view_state: Vec<u8>) -> Self {
        Self { key, view_state }
    }
}

/// Ordered snapshot of the whole stack. May hold fewer entries than there
/// are runners: surfaces that were never built contribute nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedOverlayStack {
    pub entries: Vec<PersistedEntry>,
}

impl SavedOverlayStack {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Codec failure. Decoding a stale or foreign blob is recoverable: callers
/// discard the snapshot and continue with live state.
#[derive(Debug)]
pub struct CodecError(postcard::Error);

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "saved overlay stack codec failure: {}", self.0)
    }
}

impl std::error::Error for CodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl From<postcard::Error> for CodecError {
    fn from(err: postcard::Error) -> Self {
        CodecError(err)
    }
}

pub fn encode(saved: &SavedOverlayStack) -> Result<Vec<u8>, CodecError> {
    postcard::to_stdvec(saved).map_err(CodecError::from)
}

pub fn decode(bytes: &[u8]) -> Result<SavedOverlayStack, CodecError> {
    postcard::from_bytes(bytes).map_err(CodecError::from)
}
