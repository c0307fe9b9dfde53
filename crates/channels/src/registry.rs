// Process-wide table of live plugin channels, addressed by id from the host bridge

use crate::call::{MethodCall, MethodHandler, MethodResult};
use crate::error::ChannelError;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Each channel has its own lock, so a slow call only holds up its own channel
type SharedHandler = Arc<Mutex<Box<dyn MethodHandler>>>;

static CHANNEL_REGISTRY: Lazy<Mutex<HashMap<i64, SharedHandler>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));
static NEXT_CHANNEL_ID: Lazy<Mutex<i64>> = Lazy::new(|| Mutex::new(1));

/// Store `handler` and return the id the host uses to reach it
pub fn register(handler: Box<dyn MethodHandler>) -> i64 {
    ghosten_core::init_logging();
    let mut next = NEXT_CHANNEL_ID.lock();
    let id = *next;
    *next += 1;
    drop(next);

    CHANNEL_REGISTRY
        .lock()
        .insert(id, Arc::new(Mutex::new(handler)));
    log::info!("Registered channel {}", id);
    id
}

/// Dispatch `call` to channel `id`
pub fn invoke(id: i64, call: &MethodCall) -> MethodResult {
    let handler = CHANNEL_REGISTRY
        .lock()
        .get(&id)
        .cloned()
        .ok_or(ChannelError::UnknownChannel(id))?;
    let mut handler = handler.lock();
    handler.handle(call)
}

/// Drop channel `id`, releasing whatever it owns. Returns whether it existed.
pub fn unregister(id: i64) -> bool {
    let removed = CHANNEL_REGISTRY.lock().remove(&id);
    // Dropped outside the lock; teardown may join worker threads
    match removed {
        Some(handler) => {
            drop(handler);
            log::info!("Unregistered channel {}", id);
            true
        }
        None => false,
    }
}
