//! Publish/subscribe notifier
//!
//! Listeners are delivered synchronously, in registration order. A failing or
//! panicking listener is logged and counted; the rest of the emission proceeds.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::auth::QrSnapshot;
use crate::{Error, Result};

/// Event emitted for every new QR code
pub const QR: &str = "qr";

/// Event emitted once the client is authenticated and the page is idle
pub const READY: &str = "ready";

/// Event payload
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// No payload
    None,
    /// A newly captured QR code
    Qr(QrSnapshot),
    /// Free-form payload for other events
    Value(serde_json::Value),
}

impl Payload {
    /// The QR snapshot, for `qr` payloads
    pub fn as_qr(&self) -> Option<&QrSnapshot> {
        match self {
            Payload::Qr(qr) => Some(qr),
            _ => None,
        }
    }
}

/// Event listener
pub type Listener = Arc<dyn Fn(&Payload) -> anyhow::Result<()> + Send + Sync>;

/// Wrap a closure as a [`Listener`]
pub fn listener<F>(f: F) -> Listener
where
    F: Fn(&Payload) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

#[derive(Clone)]
struct Registration {
    id: u64,
    callback: Listener,
    /// Set on the first delivery of a `once` registration
    fired: Option<Arc<AtomicBool>>,
}

fn same_listener(a: &Listener, b: &Listener) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// Event notifier
///
/// Cloning yields a handle to the same registrations, so listeners can hold a
/// notifier and emit from inside a delivery.
#[derive(Clone, Default)]
pub struct Notifier {
    listeners: Arc<Mutex<HashMap<String, Vec<Registration>>>>,
    next_id: Arc<AtomicU64>,
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: HashMap<String, usize> = self
            .lock()
            .iter()
            .map(|(event, regs)| (event.clone(), regs.len()))
            .collect();
        f.debug_struct("Notifier").field("listeners", &counts).finish()
    }
}

impl Notifier {
    /// Create a notifier with no listeners
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<Registration>>> {
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn register(&self, event: &str, callback: Listener, once: bool) {
        let registration = Registration {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            callback,
            fired: once.then(|| Arc::new(AtomicBool::new(false))),
        };
        self.lock()
            .entry(event.to_string())
            .or_default()
            .push(registration);
    }

    fn remove_where(&self, event: &str, predicate: impl Fn(&Registration) -> bool) -> usize {
        let mut listeners = self.lock();
        let Some(regs) = listeners.get_mut(event) else {
            return 0;
        };

        let before = regs.len();
        regs.retain(|reg| !predicate(reg));
        let removed = before - regs.len();

        if regs.is_empty() {
            listeners.remove(event);
        }
        removed
    }

    /// Register `callback` for `event`
    pub fn on(&self, event: &str, callback: Listener) {
        self.register(event, callback, false);
    }

    /// Register `callback` for the next delivery of `event` only
    ///
    /// The registration is distinct from any plain registration of the same
    /// callback; [`Notifier::off`] leaves it in place.
    pub fn once(&self, event: &str, callback: Listener) {
        self.register(event, callback, true);
    }

    /// Remove every plain registration of `callback` for `event`
    pub fn off(&self, event: &str, callback: &Listener) {
        let removed = self.remove_where(event, |reg| {
            reg.fired.is_none() && same_listener(&reg.callback, callback)
        });
        debug!("Removed {} listener(s) from '{}'", removed, event);
    }

    /// Number of registrations for `event`
    pub fn listener_count(&self, event: &str) -> usize {
        self.lock().get(event).map(Vec::len).unwrap_or(0)
    }

    /// Events that currently have listeners
    pub fn event_names(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    /// Deliver `payload` to every listener of `event`
    ///
    /// Returns the number of listeners invoked, or [`Error::Listener`] when any
    /// of them failed. Every listener runs either way.
    pub fn emit(&self, event: &str, payload: &Payload) -> Result<usize> {
        // Listeners may register, remove or emit while being delivered to
        let snapshot: Vec<Registration> = match self.lock().get(event) {
            Some(regs) => regs.clone(),
            None => return Ok(0),
        };

        let mut delivered = 0;
        let mut failures = 0;

        for reg in snapshot {
            if let Some(fired) = &reg.fired {
                if fired.swap(true, Ordering::SeqCst) {
                    continue;
                }
                self.remove_where(event, |r| r.id == reg.id);
            }

            delivered += 1;
            match catch_unwind(AssertUnwindSafe(|| (reg.callback)(payload))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!("Listener for '{}' failed: {:#}", event, e);
                    failures += 1;
                }
                Err(_) => {
                    warn!("Listener for '{}' panicked", event);
                    failures += 1;
                }
            }
        }

        if failures > 0 {
            return Err(Error::Listener {
                event: event.to_string(),
                failures,
            });
        }
        Ok(delivered)
    }
}
