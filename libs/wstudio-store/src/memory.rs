use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;

use wstudio_api::key::glob_match;
use wstudio_api::{
    Event, EventClock, EventStore, KeyScheme, PendingWrite, StoreError, StoreFuture, StoredRecord,
    WriteReceipt,
};

// ═══════════════════════════════════════════════════════════════
//  MemoryEventStore
// ═══════════════════════════════════════════════════════════════

/// In-process event store with the same key scheme and read/list/delete
/// semantics as the Redis adapter. Nothing survives a restart.
pub struct MemoryEventStore {
    records: RwLock<BTreeMap<String, StoredRecord>>,
    scheme: KeyScheme,
    clock: EventClock,
    closed: AtomicBool,
}

impl MemoryEventStore {
    pub fn new(scheme: KeyScheme) -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            scheme,
            clock: EventClock::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Connection("memory store closed".into()));
        }
        Ok(())
    }
}

impl Default for MemoryEventStore {
    fn default() -> Self {
        Self::new(KeyScheme::default())
    }
}

impl EventStore for MemoryEventStore {
    fn read(&self, key: &str) -> StoreFuture<'_, StoredRecord> {
        let key = key.to_string();
        Box::pin(async move {
            self.ensure_open()?;
            let records = self.records.read().await;
            Ok(records.get(&key).cloned().unwrap_or_default())
        })
    }

    fn list_keys(&self, id: &str) -> StoreFuture<'_, Vec<String>> {
        let id = id.to_string();
        let pattern = self.scheme.studio_pattern(&id);
        Box::pin(async move {
            self.ensure_open()?;
            let records = self.records.read().await;
            Ok(records
                .keys()
                .filter(|k| glob_match(&pattern, k) && self.scheme.is_record_key_of(&id, k))
                .cloned()
                .collect())
        })
    }

    fn delete(&self, key: &str) -> StoreFuture<'_, u64> {
        let key = key.to_string();
        Box::pin(async move {
            self.ensure_open()?;
            let mut records = self.records.write().await;
            Ok(records.remove(&key).map_or(0, |_| 1))
        })
    }

    fn write(&self, event: Event) -> StoreFuture<'_, WriteReceipt> {
        Box::pin(async move {
            self.ensure_open()?;
            let pending = PendingWrite::prepare(&self.scheme, &self.clock, event);
            let fields: Vec<(String, String)> = pending
                .fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect();
            self.records
                .write()
                .await
                .insert(pending.key.clone(), StoredRecord::from(fields));
            Ok(pending.into_receipt())
        })
    }

    fn close(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.closed.store(true, Ordering::Release);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_back_as_strings() {
        let store = MemoryEventStore::default();
        let receipt = store.write(Event::new("s1", "u1", "created")).await.unwrap();
        let ts = receipt.event.timestamp().unwrap();
        assert_eq!(receipt.id, format!("ibm:watson-studio:s1:{ts}"));

        let rec = store.read(&receipt.id).await.unwrap();
        assert_eq!(rec.get("studio_id"), Some("s1"));
        assert_eq!(rec.get("user_id"), Some("u1"));
        assert_eq!(rec.get("event"), Some("created"));
        assert_eq!(rec.get("timestamp"), Some(ts.to_string().as_str()));
    }

    #[tokio::test]
    async fn unknown_key_reads_empty() {
        let store = MemoryEventStore::default();
        assert!(store.read("ibm:watson-studio:nope:1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn repeated_writes_accumulate() {
        let store = MemoryEventStore::default();
        let a = store.write(Event::new("s1", "u1", "created")).await.unwrap();
        let b = store.write(Event::new("s1", "u1", "deleted")).await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(store.len().await, 2);
        assert_eq!(store.read(&a.id).await.unwrap().get("event"), Some("created"));
        assert_eq!(store.read(&b.id).await.unwrap().get("event"), Some("deleted"));
    }

    #[tokio::test]
    async fn delete_counts_removed_keys() {
        let store = MemoryEventStore::default();
        let r = store.write(Event::new("s1", "u1", "created")).await.unwrap();
        assert_eq!(store.delete("missing").await.unwrap(), 0);
        assert_eq!(store.delete(&r.id).await.unwrap(), 1);
        assert!(store.read(&r.id).await.unwrap().is_empty());
        assert_eq!(store.delete(&r.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn list_keys_is_scoped_to_studio() {
        let store = MemoryEventStore::default();
        let a = store.write(Event::new("s1", "u1", "created")).await.unwrap();
        let b = store.write(Event::new("s1", "u2", "opened")).await.unwrap();
        store.write(Event::new("s10", "u1", "created")).await.unwrap();

        let keys = store.list_keys("s1").await.unwrap();
        assert_eq!(keys, vec![a.id, b.id]);
        assert!(store.list_keys("s2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_keys_skips_studios_sharing_a_prefix() {
        let store = MemoryEventStore::default();
        let own = store.write(Event::new("s1", "u1", "created")).await.unwrap();
        let nested = store.write(Event::new("s1:x", "u1", "created")).await.unwrap();

        assert_eq!(store.list_keys("s1").await.unwrap(), vec![own.id]);
        assert_eq!(store.list_keys("s1:x").await.unwrap(), vec![nested.id]);
    }

    #[tokio::test]
    async fn closed_store_reports_connection_error() {
        let store = MemoryEventStore::default();
        store.close().await.unwrap();
        let err = store.read("k").await.unwrap_err();
        assert!(err.is_connection());
    }
}
