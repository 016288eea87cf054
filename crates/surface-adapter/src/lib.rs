//! Page surface adapter.
//!
//! The engine never talks to a browser API directly; it drives a
//! [`PageSurface`], a small capability set for interrogating and mutating one
//! live document. The chromiumoxide-backed [`ChromiumSurface`] is the
//! production implementation; tests substitute scripted mocks.

pub mod chromium;
pub mod config;
pub mod error;
pub mod exchange;
pub mod surface;
pub mod urls;

pub use chromium::{BrowserSession, ChromiumSurface};
pub use config::SurfaceConfig;
pub use error::SurfaceError;
pub use exchange::{NetworkExchange, ResponseLog};
pub use surface::{js_string, PageSurface, WaitPolicy, WaitState};
