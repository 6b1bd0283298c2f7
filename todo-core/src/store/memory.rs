/// In-memory list storage.
///
/// Holds every list behind one RwLock so each operation is atomic with
/// respect to the others. Nothing survives a restart. A client's
/// read-modify-write spanning two calls is not atomic; unless the caller
/// passes an expected version, the later replace wins.
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;

use super::{ListStorage, StoreError, VersionedList};
use crate::types::{ListMap, TodoList, Versions};

/// Lists every fresh server starts with.
pub const DEFAULT_LISTS: [(&str, &str); 2] = [
    ("0000000001", "First List"),
    ("0000000002", "Second List"),
];

#[derive(Default)]
pub struct MemoryStore {
    lists: RwLock<BTreeMap<String, VersionedList>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with the given lists, each starting at version 0.
    pub fn with_lists(lists: impl IntoIterator<Item = TodoList>) -> Self {
        let lists = lists
            .into_iter()
            .map(|list| (list.id.clone(), VersionedList { list, version: 0 }))
            .collect();
        Self {
            lists: RwLock::new(lists),
        }
    }

    /// The two fixed, empty lists.
    pub fn with_default_lists() -> Self {
        Self::with_lists(
            DEFAULT_LISTS
                .iter()
                .map(|(id, title)| TodoList::new(*id, *title)),
        )
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, VersionedList>> {
        self.lists.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, VersionedList>> {
        self.lists.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `f` to one list under the write lock, bumping its version on success.
    fn mutate<F>(&self, list_id: &str, f: F) -> Result<VersionedList, StoreError>
    where
        F: FnOnce(&mut VersionedList) -> Result<(), StoreError>,
    {
        let mut lists = self.write();
        let entry = lists
            .get_mut(list_id)
            .ok_or_else(|| StoreError::ListNotFound(list_id.to_string()))?;
        f(entry)?;
        entry.version += 1;
        Ok(entry.clone())
    }
}

impl ListStorage for MemoryStore {
    fn snapshot(&self) -> (ListMap, Versions) {
        let lists = self.read();
        let mut all = ListMap::new();
        let mut versions = Versions::new();
        for (id, entry) in lists.iter() {
            all.insert(id.clone(), entry.list.clone());
            versions.insert(id.clone(), entry.version);
        }
        (all, versions)
    }

    fn get(&self, list_id: &str) -> Option<VersionedList> {
        self.read().get(list_id).cloned()
    }

    fn append_item(&self, list_id: &str, item: Value) -> Result<VersionedList, StoreError> {
        let updated = self.mutate(list_id, |entry| {
            entry.list.todos.push(item);
            Ok(())
        })?;
        log::debug!(
            target: "todo.store",
            "Appended item to {} ({} items, v{})",
            list_id,
            updated.list.todos.len(),
            updated.version
        );
        Ok(updated)
    }

    fn remove_item_at(&self, list_id: &str, index: usize) -> Result<VersionedList, StoreError> {
        let updated = self.mutate(list_id, |entry| {
            let len = entry.list.todos.len();
            if index >= len {
                return Err(StoreError::ItemOutOfRange {
                    list_id: list_id.to_string(),
                    index,
                    len,
                });
            }
            entry.list.todos.remove(index);
            Ok(())
        })?;
        log::debug!(
            target: "todo.store",
            "Removed item {} from {} ({} items, v{})",
            index,
            list_id,
            updated.list.todos.len(),
            updated.version
        );
        Ok(updated)
    }

    fn replace_items(
        &self,
        list_id: &str,
        items: Vec<Value>,
        expected_version: Option<u64>,
    ) -> Result<VersionedList, StoreError> {
        let updated = self.mutate(list_id, |entry| {
            if let Some(expected) = expected_version {
                if expected != entry.version {
                    return Err(StoreError::Conflict {
                        list_id: list_id.to_string(),
                        expected,
                        actual: entry.version,
                    });
                }
            }
            entry.list.todos = items;
            Ok(())
        })?;
        log::debug!(
            target: "todo.store",
            "Replaced items of {} ({} items, v{})",
            list_id,
            updated.list.todos.len(),
            updated.version
        );
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{item_text, TodoItem};
    use serde_json::json;

    fn store_with(items: &[&str]) -> MemoryStore {
        let mut list = TodoList::new("L1", "First");
        list.todos = items.iter().map(|t| TodoItem::new(*t, false).to_value()).collect();
        MemoryStore::with_lists([list, TodoList::new("L2", "Second")])
    }

    fn texts(list: &TodoList) -> Vec<&str> {
        list.todos.iter().map(item_text).collect()
    }

    #[test]
    fn test_default_lists() {
        let store = MemoryStore::with_default_lists();
        let all = store.get_all();
        assert_eq!(all.len(), 2);
        assert_eq!(all["0000000001"].title, "First List");
        assert_eq!(all["0000000002"].title, "Second List");
        assert!(all.values().all(|l| l.todos.is_empty()));
    }

    #[test]
    fn test_append_to_empty_list_stores_item_as_given() {
        let store = store_with(&[]);
        let item = json!({ "text": "buy milk", "completed": false });

        let updated = store.append_item("L1", item.clone()).unwrap();

        assert_eq!(updated.list.todos, vec![item.clone()]);
        assert_eq!(updated.version, 1);
        assert_eq!(store.get_all()["L1"].todos, vec![item]);
    }

    #[test]
    fn test_append_grows_by_one_at_end() {
        let store = store_with(&["a", "b"]);
        let updated = store
            .append_item("L1", TodoItem::new("c", true).to_value())
            .unwrap();
        assert_eq!(texts(&updated.list), vec!["a", "b", "c"]);
        assert_eq!(updated.list.todos[2], json!({ "text": "c", "completed": true }));
    }

    #[test]
    fn test_remove_middle_item() {
        let store = store_with(&["A", "B", "C"]);
        let updated = store.remove_item_at("L1", 1).unwrap();
        assert_eq!(texts(&updated.list), vec!["A", "C"]);
    }

    #[test]
    fn test_remove_out_of_range() {
        let store = store_with(&["A", "B", "C"]);
        let before = store.snapshot();

        let err = store.remove_item_at("L1", 5).unwrap_err();

        assert_eq!(
            err,
            StoreError::ItemOutOfRange {
                list_id: "L1".to_string(),
                index: 5,
                len: 3
            }
        );
        assert!(err.is_not_found());
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn test_unknown_list_is_not_found_and_changes_nothing() {
        let store = store_with(&["A"]);
        let before = store.snapshot();

        let errors = [
            store.append_item("nope", Value::Null).unwrap_err(),
            store.remove_item_at("nope", 0).unwrap_err(),
            store.replace_items("nope", vec![], None).unwrap_err(),
        ];

        for err in errors {
            assert_eq!(err, StoreError::ListNotFound("nope".to_string()));
            assert!(err.is_not_found());
        }
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn test_replace_is_verbatim() {
        let store = store_with(&["A", "B"]);
        let items = vec![
            json!({ "text": "x", "completed": true, "priority": 3 }),
            json!("just a string"),
            json!(null),
            json!({ "completed": false, "text": "" }),
        ];

        store.replace_items("L1", items.clone(), None).unwrap();

        assert_eq!(store.get_all()["L1"].todos, items);
        assert_eq!(
            serde_json::to_string(&store.get_all()["L1"].todos).unwrap(),
            serde_json::to_string(&items).unwrap()
        );
    }

    #[test]
    fn test_replace_version_check() {
        let store = store_with(&["A"]);
        let current = store.get("L1").unwrap().version;

        let updated = store
            .replace_items("L1", vec![TodoItem::new("B", false).to_value()], Some(current))
            .unwrap();
        assert_eq!(updated.version, current + 1);

        let err = store
            .replace_items("L1", vec![TodoItem::new("C", false).to_value()], Some(current))
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::Conflict {
                list_id: "L1".to_string(),
                expected: current,
                actual: current + 1
            }
        );
        assert!(!err.is_not_found());
        assert_eq!(texts(&store.get("L1").unwrap().list), vec!["B"]);
    }

    #[test]
    fn test_snapshot_reports_versions() {
        let store = store_with(&["A"]);
        store.append_item("L1", Value::Null).unwrap();
        store.append_item("L1", Value::Null).unwrap();

        let (lists, versions) = store.snapshot();

        assert_eq!(lists.len(), 2);
        assert_eq!(versions["L1"], 2);
        assert_eq!(versions["L2"], 0);
    }

    #[test]
    fn test_get_all_idempotent() {
        let store = store_with(&["A", "B"]);
        assert_eq!(store.get_all(), store.get_all());
    }

    #[test]
    fn test_mutation_leaves_other_lists_alone() {
        let store = store_with(&["A"]);
        let other = store.get("L2").unwrap();

        store.append_item("L1", TodoItem::blank().to_value()).unwrap();
        store.remove_item_at("L1", 0).unwrap();

        assert_eq!(store.get("L2").unwrap(), other);
    }
}
