use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, error};

use super::event::{EventEnvelope, EventKind};

pub type Handler = Arc<dyn Fn(&EventEnvelope) -> anyhow::Result<()> + Send + Sync>;

#[derive(Default)]
struct HandlerTable {
    next_id: u64,
    by_kind: HashMap<EventKind, Vec<(u64, Handler)>>,
}

fn lock(table: &Mutex<HandlerTable>) -> MutexGuard<'_, HandlerTable> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fixed-kind publish/subscribe registry.
///
/// Delivery is synchronous and follows registration order within a kind. A
/// handler that fails (or panics) is logged and skipped; the remaining
/// handlers still run.
#[derive(Default)]
pub struct EventBus {
    table: Arc<Mutex<HandlerTable>>,
}

/// Registration token. Dropping it keeps the handler registered; call
/// [`Subscription::dispose`] to remove it.
#[derive(Debug)]
pub struct Subscription {
    table: Weak<Mutex<HandlerTable>>,
    kind: EventKind,
    id: u64,
}

impl Subscription {
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn dispose(self) {
        if let Some(table) = self.table.upgrade() {
            if let Some(handlers) = lock(&table).by_kind.get_mut(&self.kind) {
                handlers.retain(|(id, _)| *id != self.id);
            }
        }
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&EventEnvelope) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let mut table = lock(&self.table);
        let id = table.next_id;
        table.next_id += 1;
        table
            .by_kind
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));

        Subscription {
            table: Arc::downgrade(&self.table),
            kind,
            id,
        }
    }

    /// Subscribe by wire name. Unknown names are ignored and yield `None`.
    pub fn subscribe_named<F>(&self, name: &str, handler: F) -> Option<Subscription>
    where
        F: Fn(&EventEnvelope) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        match name.parse::<EventKind>() {
            Ok(kind) => Some(self.subscribe(kind, handler)),
            Err(e) => {
                debug!("Ignoring subscription: {}", e);
                None
            }
        }
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        lock(&self.table).by_kind.get(&kind).map_or(0, Vec::len)
    }

    /// Deliver `envelope` to every handler of its kind. Returns how many handlers succeeded.
    pub fn publish(&self, envelope: &EventEnvelope) -> usize {
        // Snapshot so handlers may subscribe or dispose while being called.
        let handlers: Vec<Handler> = lock(&self.table)
            .by_kind
            .get(&envelope.kind)
            .map(|hs| hs.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();

        let mut delivered = 0;
        for handler in handlers {
            match panic::catch_unwind(AssertUnwindSafe(|| handler(envelope))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => error!("Error in {} handler: {:#}", envelope.kind, e),
                Err(_) => error!("Handler for {} panicked", envelope.kind),
            }
        }
        delivered
    }
}
