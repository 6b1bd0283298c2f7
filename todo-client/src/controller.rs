//! Client-side sync controller.
//!
//! Holds a local copy of every list plus the active selection, applies user
//! edits locally first and pushes them to the server:
//!
//! - completion toggles, adds and deletes go out immediately;
//! - text edits are debounced per list and sent as one full-sequence save
//!   carrying only the latest state.
//!
//! The wire API addresses items by position only. Locally every item also
//! carries a key that lives only in this process; an echo is lined up with
//! the keys of the sequence its request was based on. Items changed after a
//! request went out are dirty and keep their local value when the echo
//! lands, so a late echo never erases newer edits.
//!
//! Requests for one list are sent one at a time, each after the previous
//! echo has been applied, so a save always carries the version the server
//! will have when it arrives. Echoes older than one already applied for the
//! same list are dropped. Failures are surfaced as a single error message
//! and never retried.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use todo_core::types::{
    item_completed, set_item_completed, set_item_text, ListMap, TodoItem, TodoList,
};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::api::{ListEcho, ListsSnapshot, TodoApi};
use crate::config::{ClientConfig, RollbackPolicy, SelectionStore};
use crate::debounce::Debouncer;
use crate::error::ClientError;

#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    pub debounce: Duration,
    pub rollback: RollbackPolicy,
    pub version_checks: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::from(&ClientConfig::default())
    }
}

impl From<&ClientConfig> for SyncOptions {
    fn from(config: &ClientConfig) -> Self {
        Self {
            debounce: config.debounce(),
            rollback: config.rollback,
            version_checks: config.version_checks,
        }
    }
}

type ItemKey = u64;

struct LocalList {
    list: TodoList,
    /// Parallel to `list.todos`.
    keys: Vec<ItemKey>,
}

impl LocalList {
    fn position_of(&self, key: ItemKey) -> Option<usize> {
        self.keys.iter().position(|k| *k == key)
    }
}

/// How an echo's items line up with the sequence its request was based on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EchoShape {
    /// Same positions; a save echoes what it sent.
    Same,
    /// One item appended at the end.
    Appended,
    /// The item at this index removed.
    Removed(usize),
}

#[derive(Default)]
struct SyncState {
    lists: BTreeMap<String, LocalList>,
    /// Last version the server reported per list.
    versions: HashMap<String, u64>,
    active: Option<String>,
    error: Option<String>,
    /// list id -> items changed locally since their last save went out
    dirty: HashMap<String, HashSet<ItemKey>>,
    next_key: ItemKey,
    next_request: u64,
    /// list id -> sequence number of the newest request whose echo was applied
    applied: HashMap<String, u64>,
}

impl SyncState {
    fn begin_request(&mut self) -> u64 {
        self.next_request += 1;
        self.next_request
    }

    fn fresh_keys(&mut self, n: usize) -> Vec<ItemKey> {
        let start = self.next_key;
        self.next_key += n as ItemKey;
        (start..self.next_key).collect()
    }

    fn mark_dirty(&mut self, list_id: &str, keys: impl IntoIterator<Item = ItemKey>) {
        let entry = self.dirty.entry(list_id.to_string()).or_default();
        entry.extend(keys);
        if entry.is_empty() {
            self.dirty.remove(list_id);
        }
    }

    /// Keys for an echo of `len` items. Falls back to fresh keys when the
    /// echo doesn't have the expected length, i.e. someone else changed the
    /// list in between and positions can't be trusted.
    fn echo_keys(&mut self, base: &[ItemKey], shape: EchoShape, len: usize) -> Vec<ItemKey> {
        match shape {
            EchoShape::Same if len == base.len() => base.to_vec(),
            EchoShape::Appended if len == base.len() + 1 => {
                let mut keys = base.to_vec();
                keys.extend(self.fresh_keys(1));
                keys
            }
            EchoShape::Removed(index) if index < base.len() && len + 1 == base.len() => {
                let mut keys = base.to_vec();
                keys.remove(index);
                keys
            }
            _ => self.fresh_keys(len),
        }
    }

    /// Install `echo` as the local copy of `list_id`, keeping dirty items' local values.
    fn install(&mut self, list_id: &str, mut echo: TodoList, keys: Vec<ItemKey>) {
        if let (Some(local), Some(dirty)) = (self.lists.get(list_id), self.dirty.get_mut(list_id)) {
            for (item, key) in echo.todos.iter_mut().zip(&keys) {
                if !dirty.contains(key) {
                    continue;
                }
                if let Some(pos) = local.position_of(*key) {
                    *item = local.list.todos[pos].clone();
                }
            }
            dirty.retain(|key| keys.contains(key));
        }
        if self.dirty.get(list_id).is_some_and(HashSet::is_empty) {
            self.dirty.remove(list_id);
        }
        self.lists
            .insert(list_id.to_string(), LocalList { list: echo, keys });
    }

    /// Apply an echo unless a newer one was already applied for this list.
    fn apply_echo(&mut self, list_id: &str, seq: u64, base: &[ItemKey], shape: EchoShape, echo: ListEcho) {
        if self.applied.get(list_id).is_some_and(|&last| last >= seq) {
            log::debug!(
                target: "todo.client.sync",
                "Dropping stale echo #{} for {}",
                seq,
                list_id
            );
            return;
        }
        self.applied.insert(list_id.to_string(), seq);
        match echo.version {
            Some(version) => self.versions.insert(list_id.to_string(), version),
            // Unknown; the next save goes out without a version check.
            None => self.versions.remove(list_id),
        };
        let keys = self.echo_keys(base, shape, echo.list.todos.len());
        self.install(list_id, echo.list, keys);
    }
}

struct Inner {
    api: Arc<dyn TodoApi>,
    options: SyncOptions,
    state: Mutex<SyncState>,
    /// One gate per list; holding it means owning that list's request slot.
    turns: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, SyncState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn report(&self, err: ClientError) {
        log::warn!(target: "todo.client.sync", "{}", err);
        self.state().error = Some(err.to_string());
    }

    /// Wait until no other request for `list_id` is in flight.
    async fn wait_turn(&self, list_id: &str) -> OwnedMutexGuard<()> {
        let gate = {
            let mut turns = self.turns.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(turns.entry(list_id.to_string()).or_default())
        };
        gate.lock_owned().await
    }

    /// Sequence number and current keys for a request on `list_id`, if we have that list.
    fn begin(&self, list_id: &str) -> Option<(u64, Vec<ItemKey>)> {
        let mut state = self.state();
        let keys = state.lists.get(list_id)?.keys.clone();
        Some((state.begin_request(), keys))
    }

    /// Send the list's current local sequence as a full replace.
    async fn save_list(&self, list_id: &str) -> Result<(), ClientError> {
        let _turn = self.wait_turn(list_id).await;
        let (seq, todos, keys, expected_version, sent) = {
            let mut state = self.state();
            let Some(local) = state.lists.get(list_id) else {
                return Ok(());
            };
            let todos = local.list.todos.clone();
            let keys = local.keys.clone();
            let expected_version = if self.options.version_checks {
                state.versions.get(list_id).copied()
            } else {
                None
            };
            let sent = state.dirty.remove(list_id).unwrap_or_default();
            (state.begin_request(), todos, keys, expected_version, sent)
        };

        log::debug!(
            target: "todo.client.sync",
            "Saving {} ({} todos, request #{}, if-match {:?})",
            list_id,
            todos.len(),
            seq,
            expected_version
        );
        match self
            .api
            .save_todo_list(list_id, &todos, expected_version)
            .await
        {
            Ok(echo) => {
                self.state()
                    .apply_echo(list_id, seq, &keys, EchoShape::Same, echo);
                Ok(())
            }
            Err(e) => {
                // Still unsaved; keep protecting those items from echoes.
                self.state().mark_dirty(list_id, sent);
                Err(e)
            }
        }
    }

    fn revert_toggle(&self, list_id: &str, key: ItemKey, previous: bool) {
        let mut state = self.state();
        let Some(local) = state.lists.get_mut(list_id) else {
            return;
        };
        if let Some(pos) = local.position_of(key) {
            set_item_completed(&mut local.list.todos[pos], previous);
        }
    }
}

pub struct SyncController {
    inner: Arc<Inner>,
    debouncer: Debouncer,
    selection: Option<SelectionStore>,
}

impl SyncController {
    pub fn new(api: Arc<dyn TodoApi>, options: SyncOptions) -> Self {
        Self {
            debouncer: Debouncer::new(options.debounce),
            inner: Arc::new(Inner {
                api,
                options,
                state: Mutex::new(SyncState::default()),
                turns: Mutex::new(HashMap::new()),
            }),
            selection: None,
        }
    }

    /// Restore the last selection from `store` and persist future selections there.
    pub fn with_selection_store(mut self, store: SelectionStore) -> Self {
        if let Some(list_id) = store.load() {
            self.inner.state().active = Some(list_id);
        }
        self.selection = Some(store);
        self
    }

    pub fn options(&self) -> SyncOptions {
        self.inner.options
    }

    /// Fetch every list. On failure the error is set and the mapping stays as it was.
    pub async fn load(&self) {
        let seq = self.inner.state().begin_request();
        let snapshot = match self.inner.api.fetch_lists().await {
            Ok(snapshot) => snapshot,
            Err(e) => return self.inner.report(e),
        };

        let mut state = self.inner.state();
        state.lists.retain(|id, _| snapshot.lists.contains_key(id));
        state.dirty.retain(|id, _| snapshot.lists.contains_key(id));
        state.versions.retain(|id, _| snapshot.lists.contains_key(id));
        let count = snapshot.lists.len();
        let ListsSnapshot { lists, versions } = snapshot;
        for (id, list) in lists {
            let base = state
                .lists
                .get(&id)
                .map(|local| local.keys.clone())
                .unwrap_or_default();
            let echo = ListEcho {
                version: versions.get(&id).copied(),
                list,
            };
            state.apply_echo(&id, seq, &base, EchoShape::Same, echo);
        }
        log::info!(target: "todo.client.sync", "Loaded {} lists", count);
    }

    /// Send pending edits, then fetch every list again.
    pub async fn reload(&self) {
        self.flush_pending().await;
        self.load().await;
    }

    /// Purely local; an unknown id simply leaves nothing to display.
    pub fn select(&self, list_id: &str) {
        self.inner.state().active = Some(list_id.to_string());
        if let Some(store) = &self.selection {
            if let Err(e) = store.save(list_id) {
                log::warn!(target: "todo.client.sync", "Failed to remember selection: {}", e);
            }
        }
    }

    /// Run `f` on the active list's item at `index`, marking it dirty.
    /// Returns the list id and item key, or None when there is no such item.
    fn change_item<R>(&self, index: usize, f: impl FnOnce(&mut Value) -> R) -> Option<(String, ItemKey, R)> {
        let mut guard = self.inner.state();
        let state = &mut *guard;
        let list_id = state.active.clone()?;
        let local = state.lists.get_mut(&list_id)?;
        let item = local.list.todos.get_mut(index)?;
        let result = f(item);
        let key = local.keys[index];
        state.mark_dirty(&list_id, [key]);
        Some((list_id, key, result))
    }

    /// Change an item's text locally and schedule a debounced save of its list.
    /// Returns false when there is no such item in the active list.
    pub fn edit_text(&self, index: usize, text: impl Into<String>) -> bool {
        let text = text.into();
        let Some((list_id, _, ())) = self.change_item(index, |item| set_item_text(item, text)) else {
            return false;
        };

        let inner = Arc::clone(&self.inner);
        let key = list_id.clone();
        self.debouncer.schedule(&list_id, async move {
            if let Err(e) = inner.save_list(&key).await {
                inner.report(e);
            }
        });
        true
    }

    /// Flip an item's completion locally and save the list right away.
    pub async fn toggle_completed(&self, index: usize) {
        let flipped = self.change_item(index, |item| {
            let previous = item_completed(item);
            set_item_completed(item, !previous);
            previous
        });
        let Some((list_id, key, previous)) = flipped else {
            return;
        };

        // This save carries the latest text too; a pending debounced save would be redundant.
        self.debouncer.cancel(&list_id);
        if let Err(e) = self.inner.save_list(&list_id).await {
            if self.inner.options.rollback == RollbackPolicy::Revert {
                self.inner.revert_toggle(&list_id, key, previous);
            }
            self.inner.report(e);
        }
    }

    /// Append a blank item on the server and take the server's copy of the list.
    pub async fn add_item(&self) {
        let Some(list_id) = self.active_list_id() else {
            return;
        };
        let _turn = self.inner.wait_turn(&list_id).await;
        let Some((seq, keys)) = self.inner.begin(&list_id) else {
            return;
        };
        match self
            .inner
            .api
            .add_todo(&list_id, &TodoItem::blank().to_value())
            .await
        {
            Ok(echo) => self
                .inner
                .state()
                .apply_echo(&list_id, seq, &keys, EchoShape::Appended, echo),
            Err(e) => self.inner.report(e),
        }
    }

    /// Remove the item at `index` on the server and take the server's copy of the list.
    pub async fn delete_item(&self, index: usize) {
        let Some(list_id) = self.active_list_id() else {
            return;
        };
        let _turn = self.inner.wait_turn(&list_id).await;
        let Some((seq, keys)) = self.inner.begin(&list_id) else {
            return;
        };
        match self.inner.api.delete_todo(&list_id, index).await {
            Ok(echo) => self
                .inner
                .state()
                .apply_echo(&list_id, seq, &keys, EchoShape::Removed(index), echo),
            Err(e) => self.inner.report(e),
        }
    }

    /// Send every pending debounced save now instead of waiting out the timer,
    /// then wait for requests already in flight.
    pub async fn flush_pending(&self) {
        for list_id in self.debouncer.take_pending() {
            if let Err(e) = self.inner.save_list(&list_id).await {
                self.inner.report(e);
            }
        }
        let busy: Vec<String> = {
            let turns = self.inner.turns.lock().unwrap_or_else(PoisonError::into_inner);
            turns.keys().cloned().collect()
        };
        for list_id in busy {
            drop(self.inner.wait_turn(&list_id).await);
        }
    }

    pub fn lists(&self) -> ListMap {
        self.inner
            .state()
            .lists
            .iter()
            .map(|(id, local)| (id.clone(), local.list.clone()))
            .collect()
    }

    pub fn list(&self, list_id: &str) -> Option<TodoList> {
        self.inner
            .state()
            .lists
            .get(list_id)
            .map(|local| local.list.clone())
    }

    /// Last version the server reported for a list.
    pub fn version(&self, list_id: &str) -> Option<u64> {
        self.inner.state().versions.get(list_id).copied()
    }

    /// False until a load succeeded with at least one list.
    pub fn is_ready(&self) -> bool {
        !self.inner.state().lists.is_empty()
    }

    pub fn active_list_id(&self) -> Option<String> {
        self.inner.state().active.clone()
    }

    /// The selected list, if the selection names a list we have.
    pub fn active_list(&self) -> Option<TodoList> {
        let state = self.inner.state();
        state
            .active
            .as_ref()
            .and_then(|id| state.lists.get(id))
            .map(|local| local.list.clone())
    }

    pub fn error(&self) -> Option<String> {
        self.inner.state().error.clone()
    }

    pub fn dismiss_error(&self) {
        self.inner.state().error = None;
    }

    pub fn has_pending_save(&self, list_id: &str) -> bool {
        self.debouncer.is_pending(list_id)
    }
}
