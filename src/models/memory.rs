//! Memory records and the wire types of the memory store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Unique identifier for a memory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryId(String);

impl MemoryId {
    /// Creates a new memory ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for MemoryId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MemoryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A memory as returned by the memory store.
///
/// Records are read-only for the whole sweep; the classifiers only ever see
/// `content`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Unique identifier.
    pub id: MemoryId,
    /// The memory content.
    pub content: String,
    /// Creation time. Millisecond Unix timestamp on the wire.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    /// Store-side lifecycle state (`active`, `paused`, ...).
    pub state: String,
    /// Identifier of the app that wrote the memory.
    pub app_id: String,
    /// Display name of the app that wrote the memory.
    pub app_name: String,
    /// Categories assigned by the store.
    #[serde(default)]
    pub categories: BTreeSet<String>,
    /// Free-form metadata.
    #[serde(rename = "metadata_", default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl MemoryRecord {
    /// Creates an active record with empty categories and metadata.
    #[must_use]
    pub fn new(id: impl Into<MemoryId>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            created_at: Utc::now(),
            state: "active".to_string(),
            app_id: String::new(),
            app_name: String::new(),
            categories: BTreeSet::new(),
            metadata: BTreeMap::new(),
        }
    }
}

/// Sort direction for memory listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Oldest first.
    Asc,
    /// Newest first.
    #[default]
    Desc,
}

impl SortDirection {
    /// Parses a direction string, defaulting to descending.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("asc") {
            Self::Asc
        } else {
            Self::Desc
        }
    }

    /// Returns the wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Request body for the paginated filter endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterRequest {
    /// 1-based page number.
    pub page: u32,
    /// Page size.
    pub size: u32,
    /// Column to sort by.
    pub sort_column: String,
    /// Sort direction.
    pub sort_direction: SortDirection,
}

impl Default for FilterRequest {
    fn default() -> Self {
        Self {
            page: 1,
            size: 25,
            sort_column: "created_at".to_string(),
            sort_direction: SortDirection::Desc,
        }
    }
}

impl FilterRequest {
    /// Sets the page number.
    #[must_use]
    pub const fn with_page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    /// Sets the page size.
    #[must_use]
    pub const fn with_size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }
}

/// One page of memories.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MemoryPage {
    /// Records on this page.
    pub items: Vec<MemoryRecord>,
    /// Total number of records across all pages.
    pub total: u64,
    /// Page number of this page.
    pub page: u32,
    /// Page size.
    pub size: u32,
    /// Total number of pages.
    pub pages: u32,
}

/// Request body for bulk deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteRequest {
    /// Memories to delete.
    pub memory_ids: Vec<MemoryId>,
}

/// Response of a bulk deletion.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeleteResponse {
    /// Human-readable outcome.
    pub message: String,
    /// Owner of the deleted memories.
    #[serde(default)]
    pub user_id: String,
}
