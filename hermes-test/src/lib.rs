//! Fixtures shared by the hermes tests and benches: a scripted link and a small recipe schema.

mod link;
pub mod recipes;

pub use link::{data_response, MockLink};
use std::sync::{Arc, Mutex};

/// Counts callback invocations across threads.
pub type SyncCounter = Arc<Mutex<Counter>>;

#[derive(Debug, Default)]
pub struct Counter {
    n: u32
}

impl Counter {
    pub fn sync() -> SyncCounter {
        Arc::new(Mutex::new(Self { n: 0 }))
    }

    pub fn inc_sync(counter: &SyncCounter) {
        if let Ok(mut this) = counter.lock() {
            this.n += 1;
        }
    }

    pub fn get_sync(counter: &SyncCounter) -> u32 {
        counter.lock().map(|this| this.n).unwrap_or_default()
    }
}
