pub mod clock;
pub mod error;
pub mod event;
pub mod key;
pub mod store;

pub use clock::EventClock;
pub use error::StoreError;
pub use event::{Event, StoredRecord, WriteReceipt};
pub use key::KeyScheme;
pub use store::{EventStore, PendingWrite, StoreFuture};
