//! # Browser capabilities
//!
//! The page and launcher interfaces the authentication protocols drive, with a
//! Chrome implementation over the CDP layer and scripted mocks.
//!
//! ## Module structure
//! - `traits`: `Page`, `BrowserSession`, `BrowserLauncher`
//! - `page`: `CdpPage`
//! - `session`: `ChromeSession`
//! - `launcher`: `ChromeLauncher` and executable discovery
//! - `scripts`: page-side JavaScript
//! - `mock`: scripted page, browser and launcher

pub mod traits;
pub mod scripts;
pub mod page;
pub mod session;
pub mod launcher;
pub mod mock;

pub use traits::{BrowserLauncher, BrowserSession, ElementHandle, Page};
pub use page::CdpPage;
pub use session::{ChromeSession, Profile};
pub use launcher::{find_chrome_executable, ChromeLauncher};
pub use mock::{LaunchRecord, MockBrowser, MockLauncher, MockPage};
