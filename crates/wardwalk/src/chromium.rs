//! Chromium driver over the Chrome `DevTools` Protocol (feature `browser`).
//!
//! Element state (attachment, visibility, enabled, occlusion, value) is read
//! by one injected function per check. Each check is its own snapshot: two
//! checks in the same poll may see the node at different moments.
//!
//! A query that the page rejects (an XPath evaluated mid-render, a node
//! removed under it) reads as "no match" and the next poll retries. A lost
//! connection to the browser ends the session instead.
//!
//! Handles are short-lived: only the element returned by the most recent
//! `find` is kept, and older handles report [`DriverError::StaleElement`].
//! The engine always acts on the handle of the wait that just finished, so
//! this never bites in practice and keeps the page's remote objects bounded.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::config::BrowserOptions;
use crate::driver::{BrowserDriver, DriverError, DriverResult, ElementHandle, ElementId};
use crate::locator::Query;
use crate::result::{WardwalkError, WardwalkResult};
use crate::session::{Session, SessionFactory};

const NODE_STATE_JS: &str = r"function () {
    const rect = this.getBoundingClientRect();
    const style = window.getComputedStyle(this);
    const visible = this.isConnected
        && rect.width > 0 && rect.height > 0
        && style.visibility !== 'hidden' && style.display !== 'none'
        && (typeof this.checkVisibility !== 'function' || this.checkVisibility());
    let obscured = false;
    if (visible) {
        const x = rect.left + rect.width / 2;
        const y = rect.top + rect.height / 2;
        const top = document.elementFromPoint(x, y);
        obscured = top !== null && top !== this && !this.contains(top);
    }
    return JSON.stringify({
        attached: this.isConnected,
        visible: visible,
        enabled: !this.disabled && this.getAttribute('aria-disabled') !== 'true',
        obscured: obscured,
        value: ('value' in this) ? String(this.value) : null,
    });
}";

const SELECT_ALL_JS: &str = r"function () {
    if (typeof this.select === 'function') { this.select(); }
}";

#[derive(Debug, PartialEq, Eq, Deserialize)]
struct NodeState {
    attached: bool,
    visible: bool,
    enabled: bool,
    obscured: bool,
    value: Option<String>,
}

/// Real browser behind the [`BrowserDriver`] trait
#[derive(Debug)]
pub struct ChromiumDriver {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    current: Option<(ElementId, Element)>,
    next_id: u64,
}

impl ChromiumDriver {
    /// Launch chromium and open a blank page
    pub async fn launch(options: &BrowserOptions) -> WardwalkResult<Self> {
        let mut builder = BrowserConfig::builder()
            .window_size(options.viewport_width, options.viewport_height);
        if !options.headless {
            builder = builder.with_head();
        }
        if !options.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(path) = &options.chromium_path {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(WardwalkError::session_open)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| WardwalkError::session_open(e.to_string()))?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| WardwalkError::session_open(e.to_string()))?;
        debug!(headless = options.headless, "chromium launched");

        Ok(Self {
            browser,
            page,
            handler,
            current: None,
            next_id: 0,
        })
    }

    fn element(&self, handle: &ElementHandle) -> DriverResult<&Element> {
        match &self.current {
            Some((id, element)) if id == &handle.id => Ok(element),
            _ => Err(DriverError::StaleElement {
                element: handle.id.clone(),
            }),
        }
    }

    async fn state(&self, handle: &ElementHandle) -> DriverResult<NodeState> {
        let element = self.element(handle)?;
        let returns = element
            .call_js_fn(NODE_STATE_JS, false)
            .await
            .map_err(|e| cdp_error("inspect", handle, &e))?;
        let raw = returns
            .result
            .value
            .and_then(|v| v.as_str().map(str::to_string))
            .ok_or_else(|| DriverError::protocol("inspect", "element state script returned nothing"))?;
        parse_state(&raw, handle)
    }
}

/// Decode the state script's JSON; a detached node is stale
fn parse_state(raw: &str, handle: &ElementHandle) -> DriverResult<NodeState> {
    let state: NodeState =
        serde_json::from_str(raw).map_err(|e| DriverError::protocol("inspect", e.to_string()))?;
    if state.attached {
        Ok(state)
    } else {
        Err(DriverError::StaleElement {
            element: handle.id.clone(),
        })
    }
}

/// How a failed `find` is reported: `None` reads as no match
fn query_error(error: &CdpError) -> Option<DriverError> {
    match error {
        CdpError::Ws(_) | CdpError::ChannelSendError(_) | CdpError::NoResponse => {
            Some(DriverError::SessionClosed)
        }
        CdpError::Chrome(_)
        | CdpError::ChromeMessage(_)
        | CdpError::JavascriptException(_)
        | CdpError::NotFound => None,
        other => Some(DriverError::protocol("find", other.to_string())),
    }
}

/// Map a CDP failure, recognising detached nodes as stale
fn cdp_error(operation: &str, handle: &ElementHandle, error: &CdpError) -> DriverError {
    let message = error.to_string();
    let detached = ["No node", "Could not find node", "not attached", "Cannot find context"]
        .iter()
        .any(|needle| message.contains(needle));
    if detached {
        DriverError::StaleElement {
            element: handle.id.clone(),
        }
    } else {
        DriverError::protocol(operation, message)
    }
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    async fn navigate(&mut self, url: &str) -> DriverResult<()> {
        self.current = None;
        self.page
            .goto(url)
            .await
            .map_err(|e| DriverError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn find(&mut self, query: &Query) -> DriverResult<Option<ElementHandle>> {
        let found = match query {
            Query::Css(selector) => self.page.find_elements(selector.as_str()).await,
            Query::XPath(expression) => self.page.find_xpaths(expression.as_str()).await,
        };
        let first = match found {
            Ok(elements) => elements.into_iter().next(),
            Err(e) => match query_error(&e) {
                Some(error) => return Err(error),
                None => {
                    trace!(%query, error = %e, "query failed, treating as absent");
                    None
                }
            },
        };
        Ok(first.map(|element| {
            self.next_id += 1;
            let id = ElementId(format!("cdp-{}", self.next_id));
            self.current = Some((id.clone(), element));
            ElementHandle::new(id, query.clone())
        }))
    }

    async fn click(&mut self, element: &ElementHandle) -> DriverResult<()> {
        self.element(element)?
            .click()
            .await
            .map_err(|e| cdp_error("click", element, &e))?;
        Ok(())
    }

    async fn type_text(&mut self, element: &ElementHandle, text: &str) -> DriverResult<()> {
        let target = self.element(element)?;
        target
            .focus()
            .await
            .map_err(|e| cdp_error("type", element, &e))?;
        target
            .type_str(text)
            .await
            .map_err(|e| cdp_error("type", element, &e))?;
        Ok(())
    }

    async fn clear(&mut self, element: &ElementHandle) -> DriverResult<()> {
        // controlled inputs ignore a scripted value change; delete like a user
        let target = self.element(element)?;
        target
            .focus()
            .await
            .map_err(|e| cdp_error("clear", element, &e))?;
        target
            .call_js_fn(SELECT_ALL_JS, false)
            .await
            .map_err(|e| cdp_error("clear", element, &e))?;
        target
            .press_key("Backspace")
            .await
            .map_err(|e| cdp_error("clear", element, &e))?;
        Ok(())
    }

    async fn is_visible(&mut self, element: &ElementHandle) -> DriverResult<bool> {
        Ok(self.state(element).await?.visible)
    }

    async fn is_enabled(&mut self, element: &ElementHandle) -> DriverResult<bool> {
        Ok(self.state(element).await?.enabled)
    }

    async fn is_obscured(&mut self, element: &ElementHandle) -> DriverResult<bool> {
        Ok(self.state(element).await?.obscured)
    }

    async fn value(&mut self, element: &ElementHandle) -> DriverResult<Option<String>> {
        Ok(self.state(element).await?.value)
    }

    async fn close(&mut self) -> DriverResult<()> {
        self.current = None;
        let result = self
            .browser
            .close()
            .await
            .map(|_| ())
            .map_err(|e| DriverError::protocol("close", e.to_string()));
        let _ = self.browser.wait().await;
        self.handler.abort();
        result
    }
}

/// Launches one chromium per session
#[derive(Debug, Clone, Default)]
pub struct ChromiumSessionFactory {
    options: BrowserOptions,
}

impl ChromiumSessionFactory {
    /// Create a factory with launch options
    #[must_use]
    pub const fn new(options: BrowserOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl SessionFactory for ChromiumSessionFactory {
    type Driver = ChromiumDriver;

    async fn open(&self) -> WardwalkResult<Session<ChromiumDriver>> {
        Ok(Session::new(ChromiumDriver::launch(&self.options).await?))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn handle() -> ElementHandle {
        ElementHandle::new("cdp-7", Query::Css("#doctor-select".to_string()))
    }

    mod error_mapping_tests {
        use super::*;

        #[test]
        fn test_detached_node_is_stale() {
            for message in [
                "No node with given id found",
                "Could not find node with given id",
                "Node is not attached to the document",
                "Cannot find context with specified id",
            ] {
                let error = cdp_error("click", &handle(), &CdpError::ChromeMessage(message.into()));
                assert_eq!(
                    error,
                    DriverError::StaleElement {
                        element: ElementId::from("cdp-7")
                    },
                    "{message}"
                );
            }
        }

        #[test]
        fn test_other_failures_are_protocol_errors() {
            let error = cdp_error("type", &handle(), &CdpError::ChromeMessage("boom".into()));
            assert!(matches!(
                &error,
                DriverError::Protocol { operation, message }
                    if operation == "type" && message.contains("boom")
            ));
            assert!(!error.is_transient());
        }

        #[test]
        fn test_rejected_query_reads_as_no_match() {
            assert_eq!(
                query_error(&CdpError::ChromeMessage("Invalid XPath".into())),
                None
            );
            assert_eq!(query_error(&CdpError::NotFound), None);
        }

        #[test]
        fn test_lost_connection_ends_the_session() {
            assert_eq!(
                query_error(&CdpError::NoResponse),
                Some(DriverError::SessionClosed)
            );
        }

        #[test]
        fn test_request_timeout_is_reported() {
            let error = query_error(&CdpError::Timeout).unwrap();
            assert!(matches!(error, DriverError::Protocol { ref operation, .. } if operation == "find"));
        }
    }

    mod node_state_tests {
        use super::*;

        #[test]
        fn test_decodes_state() {
            let state = parse_state(
                r#"{"attached":true,"visible":true,"enabled":false,"obscured":true,"value":"Dr. Perera"}"#,
                &handle(),
            )
            .unwrap();
            assert_eq!(
                state,
                NodeState {
                    attached: true,
                    visible: true,
                    enabled: false,
                    obscured: true,
                    value: Some("Dr. Perera".to_string()),
                }
            );
        }

        #[test]
        fn test_null_value() {
            let state = parse_state(
                r#"{"attached":true,"visible":false,"enabled":true,"obscured":false,"value":null}"#,
                &handle(),
            )
            .unwrap();
            assert_eq!(state.value, None);
        }

        #[test]
        fn test_detached_is_stale() {
            let err = parse_state(
                r#"{"attached":false,"visible":false,"enabled":true,"obscured":false,"value":null}"#,
                &handle(),
            )
            .unwrap_err();
            assert!(err.is_transient());
        }

        #[test]
        fn test_garbage_is_protocol_error() {
            let err = parse_state("undefined", &handle()).unwrap_err();
            assert!(matches!(err, DriverError::Protocol { ref operation, .. } if operation == "inspect"));
        }
    }
}
