//! Generic capability registry
//!
//! A keyed, insertion-ordered collection with transactional batch
//! mutations. Every mutating batch either applies completely or not at
//! all, and a batch that changed state reports exactly one [`ChangeKind`]
//! to the injected listener.
//!
//! The listener runs synchronously on the mutating caller once the write
//! lock is released: it must be non-blocking and must not re-enter the
//! registry.

use std::collections::HashMap;
use std::sync::RwLock;

/// What a mutating batch did to the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Updated,
    Removed,
    Replaced,
}

/// Listener invoked once per state-changing batch
pub type ChangeListener = Box<dyn Fn(ChangeKind) + Send + Sync>;

/// Transactional failures; the registry is untouched when one is returned
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Transaction failed: item '{0}' already exists")]
    AlreadyExists(String),

    #[error("Transaction failed: duplicate item '{0}' in input")]
    DuplicateInput(String),

    #[error("Transaction failed: cannot update '{0}' (not found)")]
    NotFound(String),
}

struct Inner<T> {
    items: HashMap<String, T>,
    /// Insertion order of keys; `list()` follows it
    order: Vec<String>,
}

/// Keyed collection of capabilities with an id extractor and an optional
/// change listener.
pub struct Registry<T> {
    inner: RwLock<Inner<T>>,
    id_of: Box<dyn Fn(&T) -> String + Send + Sync>,
    listener: Option<ChangeListener>,
}

impl<T: Clone> Registry<T> {
    pub fn new(id_of: impl Fn(&T) -> String + Send + Sync + 'static) -> Self {
        Self {
            inner: RwLock::new(Inner {
                items: HashMap::new(),
                order: Vec::new(),
            }),
            id_of: Box::new(id_of),
            listener: None,
        }
    }

    pub fn with_listener(
        id_of: impl Fn(&T) -> String + Send + Sync + 'static,
        listener: ChangeListener,
    ) -> Self {
        Self {
            listener: Some(listener),
            ..Self::new(id_of)
        }
    }

    fn notify(&self, kind: ChangeKind) {
        if let Some(listener) = &self.listener {
            listener(kind);
        }
    }

    /// All items in insertion order
    pub fn list(&self) -> Vec<T> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner
            .order
            .iter()
            .filter_map(|id| inner.items.get(id).cloned())
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<T> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.items.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert new items. Fails without mutating if any id is already
    /// present or appears twice in the input.
    pub fn add(&self, items: Vec<T>, notify: bool) -> Result<(), RegistryError> {
        if items.is_empty() {
            return Ok(());
        }

        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());

        let mut incoming = std::collections::HashSet::new();
        for item in &items {
            let id = (self.id_of)(item);
            if inner.items.contains_key(&id) {
                return Err(RegistryError::AlreadyExists(id));
            }
            if !incoming.insert(id.clone()) {
                return Err(RegistryError::DuplicateInput(id));
            }
        }

        for item in items {
            let id = (self.id_of)(&item);
            inner.order.push(id.clone());
            inner.items.insert(id, item);
        }
        drop(inner);

        if notify {
            self.notify(ChangeKind::Added);
        }
        Ok(())
    }

    /// Replace existing items in place. Fails without mutating if any id is
    /// unknown or appears twice in the input. Insertion order is kept.
    pub fn update(&self, items: Vec<T>, notify: bool) -> Result<(), RegistryError> {
        if items.is_empty() {
            return Ok(());
        }

        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());

        let mut incoming = std::collections::HashSet::new();
        for item in &items {
            let id = (self.id_of)(item);
            if !inner.items.contains_key(&id) {
                return Err(RegistryError::NotFound(id));
            }
            if !incoming.insert(id.clone()) {
                return Err(RegistryError::DuplicateInput(id));
            }
        }

        for item in items {
            let id = (self.id_of)(&item);
            inner.items.insert(id, item);
        }
        drop(inner);

        if notify {
            self.notify(ChangeKind::Updated);
        }
        Ok(())
    }

    /// Unconditional write-through; unknown ids are appended, known ids
    /// replaced in place.
    pub fn upsert(&self, items: Vec<T>, notify: bool) {
        if items.is_empty() {
            return;
        }

        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        for item in items {
            let id = (self.id_of)(&item);
            if inner.items.insert(id.clone(), item).is_none() {
                inner.order.push(id);
            }
        }
        drop(inner);

        if notify {
            self.notify(ChangeKind::Updated);
        }
    }

    /// Remove known ids, silently skipping unknown ones. The listener fires
    /// only when at least one item was actually removed.
    pub fn remove(&self, ids: &[String], notify: bool) {
        if ids.is_empty() {
            return;
        }

        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let mut modified = false;
        for id in ids {
            if inner.items.remove(id).is_some() {
                modified = true;
            }
        }
        if modified {
            let Inner { items, order } = &mut *inner;
            order.retain(|id| items.contains_key(id));
        }
        drop(inner);

        if notify && modified {
            self.notify(ChangeKind::Removed);
        }
    }

    /// Atomically replace the whole contents. Fails without mutating on a
    /// duplicate id in the input. An empty input clears the registry.
    pub fn replace_all(&self, items: Vec<T>, notify: bool) -> Result<(), RegistryError> {
        let mut fresh_items = HashMap::new();
        let mut fresh_order = Vec::with_capacity(items.len());
        for item in items {
            let id = (self.id_of)(&item);
            if fresh_items.insert(id.clone(), item).is_some() {
                return Err(RegistryError::DuplicateInput(id));
            }
            fresh_order.push(id);
        }

        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.items = fresh_items;
        inner.order = fresh_order;
        drop(inner);

        if notify {
            self.notify(ChangeKind::Replaced);
        }
        Ok(())
    }
}
