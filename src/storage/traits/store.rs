//! Memory store trait.

use crate::Result;
use crate::models::{DeleteResponse, FilterRequest, MemoryId, MemoryPage};

/// Trait for remote memory stores.
///
/// The store owns the records; the sweeper only lists them page by page and
/// asks for deletions. Implementations handle transport and authentication.
pub trait MemoryStore: Send + Sync {
    /// The backend name.
    fn name(&self) -> &'static str;

    /// Fetches one page of memories.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response does not match
    /// the expected page shape.
    fn fetch_page(&self, request: &FilterRequest) -> Result<MemoryPage>;

    /// Deletes the given memories.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the store rejects it.
    fn delete_memories(&self, ids: &[MemoryId]) -> Result<DeleteResponse>;
}

impl<S: MemoryStore + ?Sized> MemoryStore for std::sync::Arc<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn fetch_page(&self, request: &FilterRequest) -> Result<MemoryPage> {
        (**self).fetch_page(request)
    }

    fn delete_memories(&self, ids: &[MemoryId]) -> Result<DeleteResponse> {
        (**self).delete_memories(ids)
    }
}
