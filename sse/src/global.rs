//! Process-wide default registry.
//!
//! Most embedders need a single pool. They can install one with [`init`],
//! reach it from anywhere with [`registry`], and tear it down with
//! [`teardown`] at shutdown. Registries created with
//! [`StreamRegistry::new`] are independent and never touch the default.

use bytes::Bytes;
use log::*;
use std::sync::{Arc, PoisonError, RwLock};

use crate::connection::Connection;
use crate::error::Error;
use crate::registry::{StreamRegistry, DEFAULT_BUFFER_SIZE};
use crate::sink::EventSink;

static DEFAULT_REGISTRY: RwLock<Option<Arc<StreamRegistry>>> = RwLock::new(None);

/// Installs a new default registry, shutting down the one it replaces.
pub fn init(buffer_size: usize) -> Arc<StreamRegistry> {
    install(Arc::new(StreamRegistry::new(buffer_size)))
}

/// Installs `registry` as the default, shutting down the one it replaces.
pub fn install(registry: Arc<StreamRegistry>) -> Arc<StreamRegistry> {
    let previous = DEFAULT_REGISTRY
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .replace(Arc::clone(&registry));

    if let Some(previous) = previous {
        if !Arc::ptr_eq(&previous, &registry) {
            warn!("Replacing the default stream registry");
            previous.shutdown();
        }
    }
    registry
}

/// The default registry, installed with the default buffer size on first use.
pub fn registry() -> Arc<StreamRegistry> {
    if let Some(registry) = DEFAULT_REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
    {
        return Arc::clone(registry);
    }

    let mut slot = DEFAULT_REGISTRY
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    Arc::clone(slot.get_or_insert_with(|| Arc::new(StreamRegistry::new(DEFAULT_BUFFER_SIZE))))
}

/// Shuts the default registry down and uninstalls it. A later call to
/// [`registry`] installs a fresh one.
pub fn teardown() {
    let previous = DEFAULT_REGISTRY
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .take();

    if let Some(previous) = previous {
        previous.shutdown();
    }
}

pub async fn attach<S: EventSink>(thread_id: &str, sink: S) -> Result<Arc<Connection>, Error> {
    registry().attach(thread_id, sink).await
}

pub fn post(thread_id: &str, payload: impl Into<Bytes>) {
    registry().post(thread_id, payload)
}

pub fn close_thread(thread_id: &str) -> bool {
    registry().close_thread(thread_id)
}
