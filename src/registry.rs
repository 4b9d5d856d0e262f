//! Handle-keyed instance repository.
//!
//! The host process (typically the gRPC daemon layer) owns one `Registry` and
//! hands out integer handles to its clients. All access goes through a single
//! mutex; there is no ambient global state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug)]
pub struct Registry<T> {
    inner: Mutex<Inner<T>>,
}

#[derive(Debug)]
struct Inner<T> {
    next_handle: i32,
    instances: HashMap<i32, Arc<T>>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_handle: 1,
                instances: HashMap::new(),
            }),
        }
    }
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an instance and return its handle. Handles are never reused.
    pub fn create(&self, instance: T) -> i32 {
        let mut inner = self.lock();
        let handle = inner.next_handle;
        inner.next_handle += 1;
        inner.instances.insert(handle, Arc::new(instance));
        handle
    }

    /// Look up an instance. Unknown handles are an absence, not an error.
    pub fn get(&self, handle: i32) -> Option<Arc<T>> {
        self.lock().instances.get(&handle).cloned()
    }

    /// Drop an instance. Returns false if the handle was unknown.
    pub fn destroy(&self, handle: i32) -> bool {
        self.lock().instances.remove(&handle).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().instances.is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
