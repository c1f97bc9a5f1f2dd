//! # Authentication
//!
//! Two strategies bring a browser page to the logged-in state:
//! - [`NoAuth`]: throwaway profile, paired by QR on every start
//! - [`LocalAuth`]: persisted profile, validated on start and paired by QR when new
//!
//! Both compose the same protocols rather than sharing a base type:
//! - `polling`: QR polling protocol (fresh login)
//! - `validation`: session validation protocol (persisted profile)
//!
//! Probe misses never leave a protocol; callers see only terminal outcomes
//! ([`Error::QrExhausted`](crate::Error::QrExhausted),
//! [`Error::SessionExpired`](crate::Error::SessionExpired),
//! [`Error::SessionLoadFailed`](crate::Error::SessionLoadFailed)).

pub mod traits;
pub mod qr;
pub mod store;
pub mod polling;
pub mod validation;
pub mod no_auth;
pub mod local_auth;


pub use traits::{AuthStrategy, AuthenticatedSession};
pub use qr::{read_qr, QrSnapshot};
pub use store::SessionStore;
pub use polling::pair_with_qr;
pub use validation::{check_session, SessionCheck};
pub use no_auth::NoAuth;
pub use local_auth::LocalAuth;

use std::sync::Arc;

use crate::config::{AuthKind, ClientOptions};

/// Build the strategy selected by `options.auth`
pub fn strategy_for(options: &ClientOptions) -> Arc<dyn AuthStrategy> {
    match options.auth {
        AuthKind::None => Arc::new(NoAuth::new()),
        AuthKind::Local => Arc::new(LocalAuth::from_options(options)),
    }
}
