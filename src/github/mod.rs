pub mod client;
pub mod gateway;
pub mod types;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

/// Per-pull-request serialization point. Comment reconciliation and label
/// mutation for the same PR must never race each other, so both acquire the
/// PR's lock before issuing writes.
#[derive(Default)]
pub struct PrLocks {
    locks: Mutex<HashMap<u64, Arc<Mutex<()>>>>,
}

impl PrLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock_for(&self, pr_number: u64) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(pr_number)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
