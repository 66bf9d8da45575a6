//! Multipart upload records for session recordings.

use crate::hash::PartDigest;
use crate::session::SessionId;
use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;

/// Unique identifier for an upload.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UploadId(Uuid);

impl UploadId {
    /// Generate a new random upload ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse from a string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| crate::Error::InvalidUploadId(format!("{s}: {e}")))
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for UploadId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UploadId({})", self.0)
    }
}

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One part of a multipart upload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    /// Sequence number, unique within the upload. Gaps are allowed.
    pub number: u32,
    /// Content size in bytes.
    pub size: u64,
    /// Integrity tag of the content.
    pub digest: PartDigest,
}

impl Part {
    /// Describe `data` as part `number`.
    pub fn for_data(number: u32, data: &[u8]) -> Self {
        Self {
            number,
            size: data.len() as u64,
            digest: PartDigest::compute(data),
        }
    }
}

/// An in-progress or finalized recording upload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upload {
    pub id: UploadId,
    /// Session whose recording this upload holds.
    pub session_id: SessionId,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Parts ordered by part number.
    #[serde(default)]
    pub parts: Vec<Part>,
    /// Once set the upload is immutable.
    #[serde(default)]
    pub completed: bool,
}

impl Upload {
    /// Create a new, empty upload for a session.
    pub fn new(session_id: SessionId, created_at: OffsetDateTime) -> Self {
        Self {
            id: UploadId::new(),
            session_id,
            created_at,
            parts: Vec::new(),
            completed: false,
        }
    }

    /// Insert or replace a part, keeping parts ordered by number.
    pub fn put_part(&mut self, part: Part) {
        match self.parts.binary_search_by_key(&part.number, |p| p.number) {
            Ok(idx) => self.parts[idx] = part,
            Err(idx) => self.parts.insert(idx, part),
        }
    }

    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// Total bytes across all parts.
    pub fn total_size(&self) -> u64 {
        self.parts.iter().map(|p| p.size).sum()
    }

    /// Time elapsed since the upload was created. Negative ages clamp to zero.
    pub fn age(&self, now: OffsetDateTime) -> time::Duration {
        let age = now - self.created_at;
        if age.is_negative() {
            time::Duration::ZERO
        } else {
            age
        }
    }
}
