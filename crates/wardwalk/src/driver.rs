//! BrowserDriver - Abstract Browser Automation Trait
//!
//! The only boundary between the engine and the outside world. The engine is
//! agnostic to the automation protocol behind it:
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │  BrowserDriver (Abstract Trait)                                │
//! ├───────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────┐        ┌─────────────────────┐       │
//! │  │  ChromiumDriver     │        │  MockDriver         │       │
//! │  │  (feature browser)  │        │  (scripted DOM,     │       │
//! │  │  CDP via            │        │   unit tests)       │       │
//! │  │  chromiumoxide      │        │                     │       │
//! │  └─────────────────────┘        └─────────────────────┘       │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! Handles returned by [`BrowserDriver::find`] are only meaningful until the
//! DOM changes; operations on a handle whose element has been detached fail
//! with [`DriverError::StaleElement`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::locator::Query;

/// Opaque identifier for a resolved element
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementId(pub String);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ElementId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Element handle for DOM interactions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle {
    /// Driver-assigned identifier
    pub id: ElementId,
    /// Query that produced this handle
    pub query: Query,
}

impl ElementHandle {
    /// Create a new element handle
    #[must_use]
    pub fn new(id: impl Into<ElementId>, query: Query) -> Self {
        Self {
            id: id.into(),
            query,
        }
    }
}

/// Result type for driver operations
pub type DriverResult<T> = Result<T, DriverError>;

/// Failures reported by a driver implementation
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DriverError {
    /// Element was detached from the document after it was found
    #[error("element {element} is no longer attached to the document")]
    StaleElement {
        /// Handle identifier
        element: ElementId,
    },

    /// Navigation failed
    #[error("navigation to {url} failed: {message}")]
    Navigation {
        /// Target URL
        url: String,
        /// Error message
        message: String,
    },

    /// Protocol-level failure performing an operation
    #[error("{operation} failed: {message}")]
    Protocol {
        /// Operation name (`click`, `type`, ...)
        operation: String,
        /// Error message
        message: String,
    },

    /// The browser session has been closed
    #[error("browser session is closed")]
    SessionClosed,
}

impl DriverError {
    /// Create a protocol error
    #[must_use]
    pub fn protocol(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Protocol {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Whether a later poll may succeed where this one failed
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::StaleElement { .. })
    }
}

/// Capability set the engine needs from a browser
///
/// # Implementations
///
/// - `ChromiumDriver` - uses chromiumoxide (feature `browser`)
/// - [`MockDriver`](crate::mock::MockDriver) - scripted DOM for unit tests
#[async_trait]
pub trait BrowserDriver: Send {
    /// Navigate to URL
    async fn navigate(&mut self, url: &str) -> DriverResult<()>;

    /// First element matching `query` in document order, if any
    async fn find(&mut self, query: &Query) -> DriverResult<Option<ElementHandle>>;

    /// Click element
    async fn click(&mut self, element: &ElementHandle) -> DriverResult<()>;

    /// Type text into element
    async fn type_text(&mut self, element: &ElementHandle, text: &str) -> DriverResult<()>;

    /// Clear the element's current value
    async fn clear(&mut self, element: &ElementHandle) -> DriverResult<()>;

    /// Non-zero rendered size and not hidden by its own or an ancestor's style
    async fn is_visible(&mut self, element: &ElementHandle) -> DriverResult<bool>;

    /// Not disabled
    async fn is_enabled(&mut self, element: &ElementHandle) -> DriverResult<bool>;

    /// Another element sits on top of this one at its centre point
    async fn is_obscured(&mut self, element: &ElementHandle) -> DriverResult<bool> {
        let _ = element;
        Ok(false)
    }

    /// Current form value (`None` for elements without one)
    async fn value(&mut self, element: &ElementHandle) -> DriverResult<Option<String>>;

    /// Close the browser session
    async fn close(&mut self) -> DriverResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_handle_creation() {
        let handle = ElementHandle::new("el-1", Query::Css("#email".to_string()));
        assert_eq!(handle.id, ElementId("el-1".to_string()));
        assert_eq!(handle.query.as_str(), "#email");
    }

    #[test]
    fn test_only_stale_elements_are_transient() {
        assert!(DriverError::StaleElement {
            element: ElementId::from("el-1")
        }
        .is_transient());
        assert!(!DriverError::SessionClosed.is_transient());
        assert!(!DriverError::protocol("click", "detached").is_transient());
    }

    #[test]
    fn test_protocol_error_message() {
        let err = DriverError::protocol("click", "node is detached");
        assert_eq!(err.to_string(), "click failed: node is detached");
    }
}
