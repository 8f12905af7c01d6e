//! Cancellation flag and the process-wide indexing guard

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock, Mutex};

use crate::{DsError, Result};

/// Shared flag checked between files by long-running operations.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Operation currently running against each database.
static RUNNING: LazyLock<Mutex<HashMap<String, &'static str>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Held while an indexing operation runs; at most one per database per process.
#[derive(Debug)]
pub struct OperationGuard {
    scope: String,
    name: &'static str,
}

impl OperationGuard {
    /// Take the guard for `scope`, failing with [`DsError::Busy`] if another
    /// operation holds it.
    pub fn acquire(scope: &str, name: &'static str) -> Result<Self> {
        let mut running = RUNNING.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(current) = running.get(scope) {
            return Err(DsError::Busy(current.to_string()));
        }
        running.insert(scope.to_string(), name);
        Ok(Self {
            scope: scope.to_string(),
            name,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        let mut running = RUNNING.lock().unwrap_or_else(|e| e.into_inner());
        running.remove(&self.scope);
    }
}
