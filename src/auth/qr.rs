//! QR snapshots

use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::debug;

use crate::browser::Page;
use crate::Result;

/// A QR code read from the login page
///
/// Two snapshots are the same code iff their raw data is equal; the capture
/// time is diagnostic only.
#[derive(Debug, Clone)]
pub struct QrSnapshot {
    raw_data: String,
    captured_at: DateTime<Utc>,
}

impl QrSnapshot {
    /// Snapshot `raw_data` now; empty data is not a QR code
    pub fn new<S: Into<String>>(raw_data: S) -> Option<Self> {
        let raw_data = raw_data.into();
        if raw_data.is_empty() {
            return None;
        }
        Some(Self {
            raw_data,
            captured_at: Utc::now(),
        })
    }

    /// Opaque payload to be rendered as a QR code
    pub fn raw_data(&self) -> &str {
        &self.raw_data
    }

    /// When the snapshot was taken
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }
}

impl PartialEq for QrSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.raw_data == other.raw_data
    }
}

impl Eq for QrSnapshot {}

impl std::fmt::Display for QrSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw_data)
    }
}

/// Probe `page` for a QR element and read its payload
///
/// `Ok(None)` is a miss: the element did not show up within `timeout`, or it
/// carried no data.
pub async fn read_qr(page: &dyn Page, selector: &str, attribute: &str, timeout: Duration) -> Result<Option<QrSnapshot>> {
    let Some(element) = page.wait_for_selector(selector, timeout).await? else {
        return Ok(None);
    };

    let snapshot = page
        .get_attribute(&element, attribute)
        .await?
        .and_then(QrSnapshot::new);

    if snapshot.is_none() {
        debug!("QR element {} has no '{}' data", selector, attribute);
    }
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_ignores_capture_time() {
        let first = QrSnapshot::new("2@abc").unwrap();
        std::thread::sleep(Duration::from_millis(2));
        let second = QrSnapshot::new("2@abc").unwrap();

        assert_ne!(first.captured_at(), second.captured_at());
        assert_eq!(first, second);
        assert_ne!(first, QrSnapshot::new("2@abd").unwrap());
    }

    #[test]
    fn test_empty_data_is_not_a_snapshot() {
        assert!(QrSnapshot::new("").is_none());
    }
}
