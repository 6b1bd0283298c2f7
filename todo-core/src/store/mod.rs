pub mod memory;

use serde_json::Value;

use crate::types::{ListMap, TodoList, Versions};

/// A list together with its write counter.
/// The counter is store metadata; it never appears inside the list record.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedList {
    pub list: TodoList,
    pub version: u64,
}

/// Abstract storage trait for todo list backends.
/// Implementations: MemoryStore (process lifetime only).
///
/// Items are opaque JSON values and are stored exactly as given.
pub trait ListStorage: Send + Sync {
    /// Every list plus every list's version, read under one lock.
    fn snapshot(&self) -> (ListMap, Versions);

    /// Snapshot of every list, keyed by id.
    fn get_all(&self) -> ListMap {
        self.snapshot().0
    }

    /// Read a single list.
    fn get(&self, list_id: &str) -> Option<VersionedList>;

    /// Append an item to the end of a list. Returns the updated list.
    fn append_item(&self, list_id: &str, item: Value) -> Result<VersionedList, StoreError>;

    /// Remove the item at `index`, shifting later items down. Returns the updated list.
    fn remove_item_at(&self, list_id: &str, index: usize) -> Result<VersionedList, StoreError>;

    /// Replace the whole item sequence verbatim. With `expected_version` set,
    /// the write is rejected unless it matches the list's current version.
    fn replace_items(
        &self,
        list_id: &str,
        items: Vec<Value>,
        expected_version: Option<u64>,
    ) -> Result<VersionedList, StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Todo list not found: {0}")]
    ListNotFound(String),

    #[error("Todo index {index} out of range for list {list_id} ({len} items)")]
    ItemOutOfRange {
        list_id: String,
        index: usize,
        len: usize,
    },

    #[error("Todo list {list_id} changed: expected version {expected}, found {actual}")]
    Conflict {
        list_id: String,
        expected: u64,
        actual: u64,
    },
}

impl StoreError {
    /// Unknown list or unknown index; both surface as 404.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::ListNotFound(_) | StoreError::ItemOutOfRange { .. }
        )
    }
}
