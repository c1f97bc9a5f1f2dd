//! Client events
//!
//! Named events (`qr`, `ready`, and any future names) delivered through a
//! [`Notifier`].

pub mod notifier;


pub use notifier::{listener, Listener, Notifier, Payload, QR, READY};
