//! Page-side JavaScript used by [`CdpPage`](super::CdpPage)
//!
//! Selectors and attribute names are embedded as JSON string literals, so any
//! quoting inside them is escaped.

/// Current document URL
pub const LOCATION_HREF: &str = "window.location.href";

/// Document ready state
pub const READY_STATE: &str = "document.readyState";

/// Number of resources the page has fetched so far
pub const RESOURCE_COUNT: &str = "performance.getEntriesByType('resource').length";

fn js_string(value: &str) -> String {
    serde_json::Value::from(value).to_string()
}

/// `true` when `selector` matches an element
pub fn selector_exists(selector: &str) -> String {
    format!("document.querySelector({}) !== null", js_string(selector))
}

/// Attribute `name` of the first element matching `selector`, or `null`
pub fn attribute(selector: &str, name: &str) -> String {
    format!(
        "(() => {{ const el = document.querySelector({}); return el ? el.getAttribute({}) : null; }})()",
        js_string(selector),
        js_string(name)
    )
}
