//! Registration directory: every logged-in client, keyed by identity.
//!
//! A single readers-writer lock guards the map: lookups run
//! concurrently, insert/remove are exclusive, so all three operations
//! are linearizable with respect to each other.

use std::collections::HashMap;
use std::sync::Arc;

use babble_core::ClientKey;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use crate::record::ClientRecord;

/// Why a registration was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    #[error("identity {0} already in use")]
    Duplicate(ClientKey),

    #[error("max number of clients reached ({0})")]
    Full(usize),
}

/// Capacity-bounded map of client records.
#[derive(Debug)]
pub struct Directory {
    clients: RwLock<HashMap<ClientKey, Arc<ClientRecord>>>,
    capacity: usize,
}

impl Directory {
    pub fn new(capacity: usize) -> Self {
        Directory {
            clients: RwLock::new(HashMap::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub async fn lookup(&self, key: ClientKey) -> Option<Arc<ClientRecord>> {
        self.clients.read().await.get(&key).cloned()
    }

    /// Add `record` unless the directory is full or its key is taken.
    pub async fn insert(&self, record: Arc<ClientRecord>) -> Result<(), DirectoryError> {
        let mut clients = self.clients.write().await;

        if clients.len() >= self.capacity {
            return Err(DirectoryError::Full(self.capacity));
        }
        if clients.contains_key(&record.key()) {
            return Err(DirectoryError::Duplicate(record.key()));
        }

        debug!(key = %record.key(), name = record.name(), "registered");
        clients.insert(record.key(), record);
        Ok(())
    }

    /// Detach and return the record for `key`, if any.
    pub async fn remove(&self, key: ClientKey) -> Option<Arc<ClientRecord>> {
        self.clients.write().await.remove(&key)
    }

    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::tests::test_record;

    #[tokio::test]
    async fn insert_lookup_remove() {
        let dir = Directory::new(4);
        let (alice, _rx) = test_record("alice");

        dir.insert(Arc::clone(&alice)).await.unwrap();
        assert_eq!(dir.len().await, 1);

        let found = dir.lookup(alice.key()).await.unwrap();
        assert!(Arc::ptr_eq(&found, &alice));

        let removed = dir.remove(alice.key()).await.unwrap();
        assert!(Arc::ptr_eq(&removed, &alice));
        assert!(dir.lookup(alice.key()).await.is_none());
        assert!(dir.remove(alice.key()).await.is_none());
        assert!(dir.is_empty().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_duplicate_logins_admit_exactly_one() {
        let dir = Arc::new(Directory::new(16));

        let attempts: Vec<_> = (0..32)
            .map(|_| {
                let dir = Arc::clone(&dir);
                tokio::spawn(async move {
                    let (record, _rx) = test_record("alice");
                    dir.insert(record).await
                })
            })
            .collect();

        let mut ok = 0;
        let mut duplicates = 0;
        for a in attempts {
            match a.await.unwrap() {
                Ok(()) => ok += 1,
                Err(DirectoryError::Duplicate(_)) => duplicates += 1,
                Err(other) => panic!("unexpected {:?}", other),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(duplicates, 31);
        assert_eq!(dir.len().await, 1);
    }

    #[tokio::test]
    async fn full_directory_rejects_until_a_removal() {
        let dir = Directory::new(2);
        let (a, _ra) = test_record("a");
        let (b, _rb) = test_record("b");
        let (c, _rc) = test_record("c");

        dir.insert(Arc::clone(&a)).await.unwrap();
        dir.insert(b).await.unwrap();
        assert_eq!(dir.insert(Arc::clone(&c)).await, Err(DirectoryError::Full(2)));

        dir.remove(a.key()).await;
        assert_eq!(dir.insert(c).await, Ok(()));
        assert_eq!(dir.len().await, 2);
    }
}
