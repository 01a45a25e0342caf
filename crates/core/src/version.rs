//! Deployed function versions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::VersionId;

/// One distinct deployed source of a function.
///
/// Identified by `(function_name, content_hash)`: re-deploying byte-identical
/// content reuses the existing row instead of creating a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionVersion {
    /// Row id.
    pub id: VersionId,
    /// Function this version belongs to.
    pub function_name: String,
    /// Lowercase hex sha256 of the source.
    pub content_hash: String,
    /// Source size in bytes.
    pub size_bytes: u64,
    /// Who deployed it, if known.
    pub deployed_by: Option<String>,
    /// First time this content was seen.
    pub created_at: DateTime<Utc>,
    /// Free-form deploy notes.
    pub notes: Option<String>,
}

impl FunctionVersion {
    /// Create a new version row with a fresh id.
    pub fn new(
        function_name: impl Into<String>,
        content_hash: impl Into<String>,
        size_bytes: u64,
        deployed_by: Option<String>,
        notes: Option<String>,
    ) -> Self {
        Self {
            id: VersionId::v4(),
            function_name: function_name.into(),
            content_hash: content_hash.into(),
            size_bytes,
            deployed_by,
            created_at: Utc::now(),
            notes,
        }
    }

    /// Short hash prefix, handy in log lines.
    #[must_use]
    pub fn short_hash(&self) -> &str {
        let end = self.content_hash.len().min(12);
        &self.content_hash[..end]
    }
}
