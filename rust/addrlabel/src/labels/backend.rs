//! Durable key-value storage seam
//!
//! The label store persists through this trait only. Implementations:
//! - `MemoryStore` - process-local, with failure injection for tests
//! - `web::JsKeyValueStore` - the extension's storage object (wasm32)
//!
//! All operations are async and single-threaded; futures are not `Send`.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use crate::error::{Error, Result};

#[allow(async_fn_in_trait)]
pub trait KeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: String) -> Result<()>;
    /// Returns true if the key existed
    async fn delete(&self, key: &str) -> Result<bool>;
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RefCell<HashMap<String, String>>,
    fail_reads: Cell<bool>,
    fail_writes: Cell<bool>,
    reads: Cell<usize>,
    writes: Cell<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent reads fail with `StorageFailure`
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.set(fail);
    }

    /// Make subsequent writes fail with `StorageFailure`
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    /// Number of `get` calls served (including failed ones)
    pub fn read_count(&self) -> usize {
        self.reads.get()
    }

    /// Number of `set`/`delete` calls served (including failed ones)
    pub fn write_count(&self) -> usize {
        self.writes.get()
    }

    /// Raw stored value, bypassing counters and failure injection
    pub fn raw(&self, key: &str) -> Option<String> {
        self.data.borrow().get(key).cloned()
    }

    fn check_write(&self, operation: &'static str) -> Result<()> {
        self.writes.set(self.writes.get() + 1);
        if self.fail_writes.get() {
            return Err(Error::storage(operation, "injected write failure"));
        }
        Ok(())
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.reads.set(self.reads.get() + 1);
        if self.fail_reads.get() {
            return Err(Error::storage("get", "injected read failure"));
        }
        Ok(self.data.borrow().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.check_write("set")?;
        self.data.borrow_mut().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.check_write("delete")?;
        Ok(self.data.borrow_mut().remove(key).is_some())
    }
}
