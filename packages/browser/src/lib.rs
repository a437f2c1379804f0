#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Render session abstraction for JavaScript-rendered schedule pages.
//!
//! The harvesting pipeline never talks to a browser directly. It drives a
//! [`RenderSession`]: navigate, wait for an element, read the rendered
//! markup, find and click elements, and juggle browsing contexts (tabs).
//! [`ChromeSession`] implements the trait over `headless_chrome`.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use tv_schedule_browser::{ChromeSession, RenderSession, SessionConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut session = ChromeSession::launch(SessionConfig::default())?;
//! session.load("https://example.com")?;
//! if session.wait_for("h1", Duration::from_secs(10))? {
//!     let html = session.current_markup()?;
//!     println!("Extracted {} bytes of HTML", html.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod chrome;
pub mod config;
pub mod context;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

use std::fmt;
use std::time::Duration;

pub use chrome::ChromeSession;
pub use config::SessionConfig;
pub use context::with_secondary_context;

/// Identifies one browsing context (tab) within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContextId(pub usize);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "context#{}", self.0)
    }
}

/// A located element, addressed by the selector that found it and its
/// position among that selector's matches.
///
/// Handles are re-resolved on use, so an element that disappeared since it
/// was found yields [`SessionError::StaleElement`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle {
    /// Selector the element was found with.
    pub selector: String,
    /// 0-based index among the selector's matches.
    pub index: usize,
    /// Rendered inner text at the time the element was found.
    pub text: String,
}

/// How a click is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickMode {
    /// `element.click()` invoked from script.
    Script,
    /// Mouse moved to the element's centre, then pressed and released.
    Pointer,
}

/// Errors raised by a render session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The browser process could not be started.
    #[error("Browser launch failed: {0}")]
    Launch(String),

    /// Launch options or emulation overrides were rejected.
    #[error("Browser configuration error: {0}")]
    Configuration(String),

    /// Navigation failed or never finished.
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// Target URL.
        url: String,
        /// Underlying error.
        message: String,
    },

    /// Script evaluation failed.
    #[error("JavaScript execution error: {0}")]
    Script(String),

    /// Reading the rendered markup failed.
    #[error("HTML extraction error: {0}")]
    Markup(String),

    /// A previously found element is no longer present.
    #[error("Element {index} of '{selector}' is no longer present")]
    StaleElement {
        /// Selector the handle was created from.
        selector: String,
        /// Index among the selector's matches.
        index: usize,
    },

    /// Tab creation, activation or closing failed.
    #[error("Tab operation failed: {0}")]
    Tab(String),

    /// No open context has this id.
    #[error("Unknown browsing context {0}")]
    UnknownContext(ContextId),

    /// The primary context cannot be closed.
    #[error("The primary browsing context cannot be closed")]
    PrimaryContext,
}

/// A scripted browsing session over rendered pages.
///
/// Every operation acts on the active context. Waits are bounded: a wait
/// that times out returns `Ok(false)` instead of an error.
pub trait RenderSession {
    /// Navigates the active context and waits for the navigation to finish.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Navigation`] if the page cannot be loaded.
    fn load(&mut self, url: &str) -> Result<(), SessionError>;

    /// Waits up to `timeout` for an element matching `selector`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] only for failures other than the timeout.
    fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<bool, SessionError>;

    /// Returns the current rendered markup of the active context.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Markup`] if the DOM cannot be serialized.
    fn current_markup(&mut self) -> Result<String, SessionError>;

    /// Finds every element matching `selector`, in document order.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the lookup itself fails. No match is an
    /// empty list, not an error.
    fn find_all(&mut self, selector: &str) -> Result<Vec<ElementHandle>, SessionError>;

    /// Finds the first element matching `selector`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the lookup itself fails.
    fn find(&mut self, selector: &str) -> Result<Option<ElementHandle>, SessionError> {
        Ok(self.find_all(selector)?.into_iter().next())
    }

    /// Reads an attribute of a found element.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::StaleElement`] if the element is gone.
    fn attribute(
        &mut self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, SessionError>;

    /// Scrolls a found element to the centre of the viewport.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the element is gone or scrolling fails.
    fn scroll_into_view(&mut self, element: &ElementHandle) -> Result<(), SessionError>;

    /// Clicks a found element.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the element is gone or the click fails.
    fn click(&mut self, element: &ElementHandle, mode: ClickMode) -> Result<(), SessionError>;

    /// Opens a new, blank browsing context without switching to it.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Tab`] if the context cannot be created.
    fn open_context(&mut self) -> Result<ContextId, SessionError>;

    /// Closes a secondary context. If it was active, the primary context
    /// becomes active and is brought to the front.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::PrimaryContext`] for the primary context and
    /// [`SessionError::UnknownContext`] for an id that is not open.
    fn close_context(&mut self, id: ContextId) -> Result<(), SessionError>;

    /// Makes `id` the active context.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::UnknownContext`] for an id that is not open.
    fn switch_context(&mut self, id: ContextId) -> Result<(), SessionError>;

    /// The context operations currently act on.
    fn active_context(&self) -> ContextId;

    /// The context the session was created with.
    fn primary_context(&self) -> ContextId;

    /// Overrides the timezone (IANA id) of every current and future
    /// context.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Configuration`] if the id is rejected.
    fn set_timezone(&mut self, timezone_id: &str) -> Result<(), SessionError>;
}
