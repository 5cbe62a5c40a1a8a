//! In-memory store.
//!
//! Holds records in insertion order and paginates them the way the remote
//! store does. Used for dry runs against fixtures and in tests, where page
//! and delete failures can be injected.

use super::MemoryStore;
use crate::models::{DeleteResponse, FilterRequest, MemoryId, MemoryPage, MemoryRecord};
use crate::{Error, Result};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct State {
    records: Vec<MemoryRecord>,
    failing_pages: HashSet<u32>,
    failing_deletes: HashSet<MemoryId>,
    rejects_credentials: bool,
    deleted: Vec<MemoryId>,
    fetched_pages: Vec<u32>,
}

/// Memory store backed by a `Vec`.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding the given records.
    #[must_use]
    pub fn with_records(records: Vec<MemoryRecord>) -> Self {
        Self {
            state: Mutex::new(State {
                records,
                ..State::default()
            }),
        }
    }

    /// Makes every fetch of `page` fail.
    #[must_use]
    pub fn with_failing_page(self, page: u32) -> Self {
        self.lock().failing_pages.insert(page);
        self
    }

    /// Makes every deletion that includes `id` fail.
    #[must_use]
    pub fn with_failing_delete(self, id: impl Into<MemoryId>) -> Self {
        self.lock().failing_deletes.insert(id.into());
        self
    }

    /// Makes every request fail as if the bearer token were refused.
    #[must_use]
    pub fn with_rejected_credentials(self) -> Self {
        self.lock().rejects_credentials = true;
        self
    }

    /// Returns the IDs of records still in the store.
    #[must_use]
    pub fn ids(&self) -> Vec<MemoryId> {
        self.lock().records.iter().map(|r| r.id.clone()).collect()
    }

    /// Returns the IDs deleted so far, in deletion order.
    #[must_use]
    pub fn deleted(&self) -> Vec<MemoryId> {
        self.lock().deleted.clone()
    }

    /// Returns the page numbers requested so far, in request order.
    #[must_use]
    pub fn fetched_pages(&self) -> Vec<u32> {
        self.lock().fetched_pages.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MemoryStore for InMemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn fetch_page(&self, request: &FilterRequest) -> Result<MemoryPage> {
        let mut state = self.lock();
        state.fetched_pages.push(request.page);

        if state.rejects_credentials {
            return Err(Error::Unauthorized("memory store rejected bearer token".to_string()));
        }
        if state.failing_pages.contains(&request.page) {
            return Err(Error::OperationFailed {
                operation: "memory_fetch_page".to_string(),
                cause: format!("injected failure for page {}", request.page),
            });
        }
        if request.page == 0 || request.size == 0 {
            return Err(Error::InvalidInput(
                "page and size must be positive".to_string(),
            ));
        }

        let size = request.size as usize;
        let total = state.records.len();
        let pages = total.div_ceil(size);
        let start = (request.page as usize - 1).saturating_mul(size);
        let items = state
            .records
            .iter()
            .skip(start)
            .take(size)
            .cloned()
            .collect();

        Ok(MemoryPage {
            items,
            total: total as u64,
            page: request.page,
            size: request.size,
            pages: u32::try_from(pages).unwrap_or(u32::MAX),
        })
    }

    fn delete_memories(&self, ids: &[MemoryId]) -> Result<DeleteResponse> {
        let mut state = self.lock();
        if state.rejects_credentials {
            return Err(Error::Unauthorized("memory store rejected bearer token".to_string()));
        }
        if let Some(id) = ids.iter().find(|id| state.failing_deletes.contains(*id)) {
            return Err(Error::OperationFailed {
                operation: "memory_delete".to_string(),
                cause: format!("injected failure for {id}"),
            });
        }

        let before = state.records.len();
        state.records.retain(|r| !ids.contains(&r.id));
        let removed = before - state.records.len();
        state.deleted.extend(ids.iter().cloned());

        Ok(DeleteResponse {
            message: format!("Successfully deleted {removed} memories"),
            user_id: "local".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(n: usize) -> InMemoryStore {
        InMemoryStore::with_records(
            (0..n)
                .map(|i| MemoryRecord::new(format!("m{i}"), format!("memory {i}")))
                .collect(),
        )
    }

    #[test]
    fn test_pagination() {
        let store = store_with(5);
        let request = FilterRequest::default().with_size(2);

        let first = store.fetch_page(&request).expect("page 1");
        assert_eq!(first.pages, 3);
        assert_eq!(first.total, 5);
        assert_eq!(first.items.len(), 2);

        let last = store.fetch_page(&request.clone().with_page(3)).expect("page 3");
        assert_eq!(last.items.len(), 1);
        assert_eq!(last.items[0].id.as_str(), "m4");

        let beyond = store.fetch_page(&request.with_page(4)).expect("page 4");
        assert!(beyond.items.is_empty());
    }

    #[test]
    fn test_empty_store_reports_zero_pages() {
        let page = InMemoryStore::new()
            .fetch_page(&FilterRequest::default())
            .expect("page 1");
        assert_eq!(page.pages, 0);
        assert!(page.items.is_empty());
    }

    #[test]
    fn test_injected_failures() {
        let store = store_with(2)
            .with_failing_page(1)
            .with_failing_delete("m0");

        assert!(store.fetch_page(&FilterRequest::default()).is_err());
        assert!(store.delete_memories(&[MemoryId::new("m0")]).is_err());
        assert_eq!(store.ids().len(), 2);
        assert_eq!(store.fetched_pages(), vec![1]);
    }

    #[test]
    fn test_rejected_credentials() {
        let store = store_with(1).with_rejected_credentials();

        assert!(matches!(
            store.fetch_page(&FilterRequest::default()),
            Err(Error::Unauthorized(_))
        ));
        assert!(matches!(
            store.delete_memories(&[MemoryId::new("m0")]),
            Err(Error::Unauthorized(_))
        ));
        assert_eq!(store.ids().len(), 1);
    }

    #[test]
    fn test_delete_removes_records() {
        let store = store_with(3);
        let response = store
            .delete_memories(&[MemoryId::new("m1")])
            .expect("delete");

        assert_eq!(response.message, "Successfully deleted 1 memories");
        assert_eq!(store.ids(), vec![MemoryId::new("m0"), MemoryId::new("m2")]);
        assert_eq!(store.deleted(), vec![MemoryId::new("m1")]);
    }
}
