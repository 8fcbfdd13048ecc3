use std::future::Future;
use std::pin::Pin;

use crate::clock::EventClock;
use crate::error::StoreError;
use crate::event::{Event, RECORD_FIELDS, STUDIO_ID, StoredRecord, WriteReceipt};
use crate::key::KeyScheme;

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Event store seam between the HTTP façade and the backing database.
///
/// Every method maps to exactly one store command (`list_keys` walks a
/// single cursor). Nothing is retried, and errors come back as-is.
pub trait EventStore: Send + Sync {
    /// All fields of the hash at `key`. Missing key → empty record.
    fn read(&self, key: &str) -> StoreFuture<'_, StoredRecord>;

    /// Record keys of studio `id`, sorted.
    fn list_keys(&self, id: &str) -> StoreFuture<'_, Vec<String>>;

    /// Remove `key`; returns how many keys were removed (0 or 1).
    fn delete(&self, key: &str) -> StoreFuture<'_, u64>;

    /// Stamp `event`, persist it under a fresh key, and hand both back.
    fn write(&self, event: Event) -> StoreFuture<'_, WriteReceipt>;

    /// Release the underlying connection. Later calls fail with
    /// [`StoreError::Connection`].
    fn close(&self) -> StoreFuture<'_, ()>;
}

/// Key and hash fields for one write, computed before touching the store.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingWrite {
    pub key: String,
    pub fields: Vec<(&'static str, String)>,
    pub event: Event,
}

impl PendingWrite {
    pub fn prepare(scheme: &KeyScheme, clock: &EventClock, mut event: Event) -> Self {
        let ts = clock.next_ms();
        event.stamp(ts);
        let key = scheme.record_key(&event.field_text(STUDIO_ID), ts);
        let fields = RECORD_FIELDS
            .iter()
            .map(|name| (*name, event.field_text(name)))
            .collect();
        Self { key, fields, event }
    }

    pub fn into_receipt(self) -> WriteReceipt {
        WriteReceipt {
            id: self.key,
            event: self.event,
        }
    }
}
