//! Per-account mutual exclusion for the processing critical section
//!
//! Monitored accounts get a dedicated lock each. Any other account maps onto
//! a fixed set of striped locks by hash, so the registry never grows and two
//! jobs for the same account always contend on the same mutex.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

pub const DEFAULT_STRIPES: usize = 16;

pub struct AccountLocks {
    dedicated: HashMap<String, Arc<Mutex<()>>>,
    stripes: Vec<Arc<Mutex<()>>>,
}

impl AccountLocks {
    pub fn new<I, S>(accounts: I, stripes: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let dedicated = accounts
            .into_iter()
            .map(|a| (a.into(), Arc::new(Mutex::new(()))))
            .collect();
        let stripes = (0..stripes.max(1))
            .map(|_| Arc::new(Mutex::new(())))
            .collect();
        Self { dedicated, stripes }
    }

    pub fn lock_for(&self, account: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self.dedicated.get(account) {
            return lock.clone();
        }
        let mut hasher = DefaultHasher::new();
        account.hash(&mut hasher);
        let index = (hasher.finish() % self.stripes.len() as u64) as usize;
        self.stripes[index].clone()
    }

    /// Wait for exclusive access to `account`
    pub async fn acquire(&self, account: &str) -> OwnedMutexGuard<()> {
        self.lock_for(account).lock_owned().await
    }

    pub fn dedicated_count(&self) -> usize {
        self.dedicated.len()
    }
}
