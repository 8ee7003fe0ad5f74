//! Scripted DOM timeline for exercising the engine without a browser.
//!
//! A [`MockDriver`] holds a list of [`MockElement`]s in document order. Each
//! element has a timeline relative to its *activation*: at driver
//! construction by default, or when a trigger fires (a click on another
//! element, a navigation). Relative to activation an element appears, becomes
//! visible, becomes enabled, stops being obscured and optionally goes away
//! again, which is enough to model async data loads, animated dropdowns and
//! list re-renders.
//!
//! Time comes from `tokio::time`, so tests running on a paused runtime see a
//! deterministic timeline.
//!
//! `MockDriver` is a cheap handle onto shared state: clone it before handing
//! it to a session and keep the clone to inspect the call history afterwards.
//! [`MockSessionFactory`] does the same for suites, keeping a clone of every
//! driver it hands out.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

use crate::driver::{BrowserDriver, DriverError, DriverResult, ElementHandle, ElementId};
use crate::locator::{ElementReference, Query};
use crate::result::{WardwalkError, WardwalkResult};
use crate::session::{Session, SessionFactory};

/// What starts an element's timeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// Active from the moment it is added
    Immediately,
    /// Activated when an element matching this query is clicked
    Click(Query),
    /// Activated when a navigation targets a URL ending with this suffix
    Navigate(String),
}

/// One scripted element
#[derive(Debug, Clone)]
pub struct MockElement {
    query: Query,
    trigger: Trigger,
    appear_after: Duration,
    visible_after: Duration,
    enabled_after: Duration,
    obscured_for: Duration,
    removed_after: Option<Duration>,
    removed_on_click: bool,
    hidden: bool,
    disabled: bool,
    initial_value: String,
    max_length: Option<usize>,
    click_error: Option<DriverError>,
    type_error: Option<DriverError>,
}

impl MockElement {
    /// Element matched by `reference`, present, visible and enabled immediately
    #[must_use]
    pub fn new(reference: ElementReference) -> Self {
        Self::query(reference.to_query())
    }

    /// Element matched by a raw query
    #[must_use]
    pub fn query(query: Query) -> Self {
        Self {
            query,
            trigger: Trigger::Immediately,
            appear_after: Duration::ZERO,
            visible_after: Duration::ZERO,
            enabled_after: Duration::ZERO,
            obscured_for: Duration::ZERO,
            removed_after: None,
            removed_on_click: false,
            hidden: false,
            disabled: false,
            initial_value: String::new(),
            max_length: None,
            click_error: None,
            type_error: None,
        }
    }

    /// Start the timeline when `reference` is clicked
    #[must_use]
    pub fn after_click(mut self, reference: &ElementReference) -> Self {
        self.trigger = Trigger::Click(reference.to_query());
        self
    }

    /// Start the timeline when a URL ending with `suffix` is loaded
    #[must_use]
    pub fn after_navigate(mut self, suffix: impl Into<String>) -> Self {
        self.trigger = Trigger::Navigate(suffix.into());
        self
    }

    /// Delay from activation until the element is in the DOM
    #[must_use]
    pub const fn appears_after(mut self, delay: Duration) -> Self {
        self.appear_after = delay;
        self
    }

    /// Delay from appearance until the element is visible
    #[must_use]
    pub const fn visible_after(mut self, delay: Duration) -> Self {
        self.visible_after = delay;
        self
    }

    /// Delay from appearance until the element is enabled
    #[must_use]
    pub const fn enabled_after(mut self, delay: Duration) -> Self {
        self.enabled_after = delay;
        self
    }

    /// Something covers the element for this long after it appears
    #[must_use]
    pub const fn obscured_for(mut self, duration: Duration) -> Self {
        self.obscured_for = duration;
        self
    }

    /// The element leaves the DOM this long after it appears
    #[must_use]
    pub const fn removed_after(mut self, delay: Duration) -> Self {
        self.removed_after = Some(delay);
        self
    }

    /// Clicking the element removes it (a list option closing its list)
    #[must_use]
    pub const fn removed_on_click(mut self) -> Self {
        self.removed_on_click = true;
        self
    }

    /// Present but never visible
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Present but never enabled
    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    /// Pre-existing field value
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.initial_value = value.into();
        self
    }

    /// Typed input beyond `len` characters is dropped
    #[must_use]
    pub const fn max_length(mut self, len: usize) -> Self {
        self.max_length = Some(len);
        self
    }

    /// Clicking fails with `error`
    #[must_use]
    pub fn fail_click(mut self, error: DriverError) -> Self {
        self.click_error = Some(error);
        self
    }

    /// Typing fails with `error`
    #[must_use]
    pub fn fail_type(mut self, error: DriverError) -> Self {
        self.type_error = Some(error);
        self
    }
}

/// A recorded driver call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    /// Time since the driver was created
    pub at: Duration,
    /// Call description, e.g. `click:el-3` or `navigate:http://...`
    pub call: String,
}

#[derive(Debug)]
struct Slot {
    id: ElementId,
    element: MockElement,
    activated_at: Option<Instant>,
    removed: bool,
    value: String,
}

impl Slot {
    fn appeared_at(&self) -> Option<Instant> {
        self.activated_at.map(|t| t + self.element.appear_after)
    }

    fn is_present(&self, now: Instant) -> bool {
        if self.removed {
            return false;
        }
        let Some(appeared) = self.appeared_at() else {
            return false;
        };
        if now < appeared {
            return false;
        }
        self.element
            .removed_after
            .map_or(true, |gone| now < appeared + gone)
    }

    fn since_appearance(&self, now: Instant) -> Duration {
        self.appeared_at()
            .map_or(Duration::ZERO, |t| now.saturating_duration_since(t))
    }
}

#[derive(Debug)]
struct MockState {
    origin: Instant,
    slots: Vec<Slot>,
    history: Vec<MockCall>,
    current_url: String,
    closed: bool,
    close_calls: usize,
    close_error: Option<DriverError>,
    next_id: usize,
}

impl MockState {
    fn record(&mut self, call: String) {
        let at = self.origin.elapsed();
        self.history.push(MockCall { at, call });
    }

    fn ensure_open(&self) -> DriverResult<()> {
        if self.closed {
            Err(DriverError::SessionClosed)
        } else {
            Ok(())
        }
    }

    fn live_slot(&mut self, id: &ElementId) -> DriverResult<&mut Slot> {
        self.ensure_open()?;
        let now = Instant::now();
        self.slots
            .iter_mut()
            .find(|s| &s.id == id)
            .filter(|s| s.is_present(now))
            .ok_or_else(|| DriverError::StaleElement {
                element: id.clone(),
            })
    }

    fn fire(&mut self, trigger: &Trigger) {
        let now = Instant::now();
        for slot in &mut self.slots {
            let matches = match (&slot.element.trigger, trigger) {
                (Trigger::Click(a), Trigger::Click(b)) => a == b,
                (Trigger::Navigate(suffix), Trigger::Navigate(url)) => url.ends_with(suffix),
                _ => false,
            };
            if matches && slot.activated_at.is_none() {
                slot.activated_at = Some(now);
            }
        }
    }
}

/// Mock driver for unit testing
#[derive(Debug, Clone)]
pub struct MockDriver {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriver {
    /// Create an empty document
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                origin: Instant::now(),
                slots: Vec::new(),
                history: Vec::new(),
                current_url: String::from("about:blank"),
                closed: false,
                close_calls: 0,
                close_error: None,
                next_id: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an element to the document; returns its handle id
    pub fn add(&self, element: MockElement) -> ElementId {
        let mut state = self.lock();
        state.next_id += 1;
        let id = ElementId(format!("el-{}", state.next_id));
        let activated_at = (element.trigger == Trigger::Immediately).then(Instant::now);
        let value = element.initial_value.clone();
        state.slots.push(Slot {
            id: id.clone(),
            element,
            activated_at,
            removed: false,
            value,
        });
        id
    }

    /// Simulate the browser going away underneath the engine
    pub fn close_now(&self) {
        self.lock().closed = true;
    }

    /// `close` tears the session down but reports `error`
    pub fn fail_close(&self, error: DriverError) {
        self.lock().close_error = Some(error);
    }

    /// Recorded calls, oldest first
    #[must_use]
    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().history.clone()
    }

    /// Recorded call descriptions, oldest first
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.lock().history.iter().map(|c| c.call.clone()).collect()
    }

    /// Check if a call starting with `prefix` was recorded
    #[must_use]
    pub fn was_called(&self, prefix: &str) -> bool {
        self.lock().history.iter().any(|c| c.call.starts_with(prefix))
    }

    /// Number of times `close` was invoked
    #[must_use]
    pub fn close_count(&self) -> usize {
        self.lock().close_calls
    }

    /// Last URL navigated to
    #[must_use]
    pub fn current_url(&self) -> String {
        self.lock().current_url.clone()
    }

    /// Current value of the element with this id
    #[must_use]
    pub fn value_of(&self, id: &ElementId) -> Option<String> {
        self.lock()
            .slots
            .iter()
            .find(|s| &s.id == id)
            .map(|s| s.value.clone())
    }
}

#[async_trait]
impl BrowserDriver for MockDriver {
    async fn navigate(&mut self, url: &str) -> DriverResult<()> {
        let mut state = self.lock();
        state.ensure_open()?;
        state.record(format!("navigate:{url}"));
        state.current_url = url.to_string();
        state.fire(&Trigger::Navigate(url.to_string()));
        Ok(())
    }

    async fn find(&mut self, query: &Query) -> DriverResult<Option<ElementHandle>> {
        let state = self.lock();
        state.ensure_open()?;
        let now = Instant::now();
        Ok(state
            .slots
            .iter()
            .find(|s| &s.element.query == query && s.is_present(now))
            .map(|s| ElementHandle::new(s.id.clone(), query.clone())))
    }

    async fn click(&mut self, element: &ElementHandle) -> DriverResult<()> {
        let mut state = self.lock();
        let slot = state.live_slot(&element.id)?;
        if let Some(err) = slot.element.click_error.clone() {
            return Err(err);
        }
        if slot.element.removed_on_click {
            slot.removed = true;
        }
        let query = slot.element.query.clone();
        state.record(format!("click:{}", element.id));
        state.fire(&Trigger::Click(query));
        Ok(())
    }

    async fn type_text(&mut self, element: &ElementHandle, text: &str) -> DriverResult<()> {
        let mut state = self.lock();
        let slot = state.live_slot(&element.id)?;
        if let Some(err) = slot.element.type_error.clone() {
            return Err(err);
        }
        slot.value.push_str(text);
        if let Some(max) = slot.element.max_length {
            slot.value = slot.value.chars().take(max).collect();
        }
        state.record(format!("type:{}:{text}", element.id));
        Ok(())
    }

    async fn clear(&mut self, element: &ElementHandle) -> DriverResult<()> {
        let mut state = self.lock();
        state.live_slot(&element.id)?.value.clear();
        state.record(format!("clear:{}", element.id));
        Ok(())
    }

    async fn is_visible(&mut self, element: &ElementHandle) -> DriverResult<bool> {
        let mut state = self.lock();
        let now = Instant::now();
        let slot = state.live_slot(&element.id)?;
        Ok(!slot.element.hidden && slot.since_appearance(now) >= slot.element.visible_after)
    }

    async fn is_enabled(&mut self, element: &ElementHandle) -> DriverResult<bool> {
        let mut state = self.lock();
        let now = Instant::now();
        let slot = state.live_slot(&element.id)?;
        Ok(!slot.element.disabled && slot.since_appearance(now) >= slot.element.enabled_after)
    }

    async fn is_obscured(&mut self, element: &ElementHandle) -> DriverResult<bool> {
        let mut state = self.lock();
        let now = Instant::now();
        let slot = state.live_slot(&element.id)?;
        Ok(slot.since_appearance(now) < slot.element.obscured_for)
    }

    async fn value(&mut self, element: &ElementHandle) -> DriverResult<Option<String>> {
        let mut state = self.lock();
        Ok(Some(state.live_slot(&element.id)?.value.clone()))
    }

    async fn close(&mut self) -> DriverResult<()> {
        let mut state = self.lock();
        state.close_calls += 1;
        state.ensure_open()?;
        state.record("close".to_string());
        state.closed = true;
        state.close_error.take().map_or(Ok(()), Err)
    }
}

type BuildDriver = Box<dyn Fn() -> MockDriver + Send + Sync>;

/// Session factory handing out scripted documents
pub struct MockSessionFactory {
    build: BuildDriver,
    fail_with: Option<String>,
    opened: Mutex<Vec<MockDriver>>,
}

impl std::fmt::Debug for MockSessionFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSessionFactory")
            .field("fail_with", &self.fail_with)
            .field("opened", &self.opened().len())
            .finish_non_exhaustive()
    }
}

impl MockSessionFactory {
    /// Every session gets a fresh document from `build`
    #[must_use]
    pub fn new(build: impl Fn() -> MockDriver + Send + Sync + 'static) -> Self {
        Self {
            build: Box::new(build),
            fail_with: None,
            opened: Mutex::new(Vec::new()),
        }
    }

    /// Every `open` fails with `message`
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        let mut factory = Self::new(MockDriver::new);
        factory.fail_with = Some(message.into());
        factory
    }

    /// Handles onto every driver opened so far
    #[must_use]
    pub fn opened(&self) -> Vec<MockDriver> {
        self.opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl SessionFactory for MockSessionFactory {
    type Driver = MockDriver;

    async fn open(&self) -> WardwalkResult<Session<MockDriver>> {
        if let Some(message) = &self.fail_with {
            return Err(WardwalkError::session_open(message.clone()));
        }
        let driver = (self.build)();
        self.opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(driver.clone());
        Ok(Session::new(driver))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn email() -> ElementReference {
        ElementReference::id("email")
    }

    async fn find(driver: &mut MockDriver, reference: &ElementReference) -> Option<ElementHandle> {
        driver.find(&reference.to_query()).await.unwrap()
    }

    mod timeline_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_element_appears_after_delay() {
            let mut driver = MockDriver::new();
            driver.add(MockElement::new(email()).appears_after(Duration::from_millis(300)));

            assert!(find(&mut driver, &email()).await.is_none());
            tokio::time::sleep(Duration::from_millis(300)).await;
            assert!(find(&mut driver, &email()).await.is_some());
        }

        #[tokio::test(start_paused = true)]
        async fn test_visibility_follows_appearance() {
            let mut driver = MockDriver::new();
            driver.add(MockElement::new(email()).visible_after(Duration::from_millis(200)));

            let handle = find(&mut driver, &email()).await.unwrap();
            assert!(!driver.is_visible(&handle).await.unwrap());
            tokio::time::sleep(Duration::from_millis(200)).await;
            assert!(driver.is_visible(&handle).await.unwrap());
        }

        #[tokio::test(start_paused = true)]
        async fn test_removed_element_goes_stale() {
            let mut driver = MockDriver::new();
            driver.add(MockElement::new(email()).removed_after(Duration::from_millis(100)));

            let handle = find(&mut driver, &email()).await.unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
            let err = driver.click(&handle).await.unwrap_err();
            assert!(err.is_transient());
            assert!(find(&mut driver, &email()).await.is_none());
        }

        #[tokio::test]
        async fn test_click_trigger_activates_dependents() {
            let mut driver = MockDriver::new();
            let select = ElementReference::id("gender");
            driver.add(MockElement::new(select.clone()));
            driver.add(MockElement::new(ElementReference::first_option()).after_click(&select));

            assert!(find(&mut driver, &ElementReference::first_option())
                .await
                .is_none());
            let handle = find(&mut driver, &select).await.unwrap();
            driver.click(&handle).await.unwrap();
            assert!(find(&mut driver, &ElementReference::first_option())
                .await
                .is_some());
        }

        #[tokio::test]
        async fn test_navigate_trigger_matches_suffix() {
            let mut driver = MockDriver::new();
            driver.add(MockElement::new(email()).after_navigate("/login"));

            driver.navigate("http://localhost:3000/login").await.unwrap();
            assert!(find(&mut driver, &email()).await.is_some());
            assert_eq!(driver.current_url(), "http://localhost:3000/login");
        }

        #[tokio::test]
        async fn test_option_removed_on_click_reveals_next() {
            let mut driver = MockDriver::new();
            let option = ElementReference::first_option();
            let first = driver.add(MockElement::new(option.clone()).removed_on_click());
            let second = driver.add(MockElement::new(option.clone()));

            let handle = find(&mut driver, &option).await.unwrap();
            assert_eq!(handle.id, first);
            driver.click(&handle).await.unwrap();
            assert_eq!(find(&mut driver, &option).await.unwrap().id, second);
        }
    }

    mod input_tests {
        use super::*;

        #[tokio::test]
        async fn test_clear_then_type() {
            let mut driver = MockDriver::new();
            let id = driver.add(MockElement::new(email()).with_value("old@example.com"));
            let handle = find(&mut driver, &email()).await.unwrap();

            driver.clear(&handle).await.unwrap();
            driver.type_text(&handle, "new@example.com").await.unwrap();
            assert_eq!(driver.value_of(&id).unwrap(), "new@example.com");
        }

        #[tokio::test]
        async fn test_max_length_truncates() {
            let mut driver = MockDriver::new();
            driver.add(MockElement::new(email()).max_length(3));
            let handle = find(&mut driver, &email()).await.unwrap();

            driver.type_text(&handle, "abcdef").await.unwrap();
            assert_eq!(driver.value(&handle).await.unwrap().unwrap(), "abc");
        }
    }

    mod history_tests {
        use super::*;

        #[tokio::test]
        async fn test_history_tracking() {
            let mut driver = MockDriver::new();
            let probe = driver.clone();
            driver.add(MockElement::new(email()));

            driver.navigate("http://app/login").await.unwrap();
            let handle = find(&mut driver, &email()).await.unwrap();
            driver.click(&handle).await.unwrap();
            driver.close().await.unwrap();

            assert_eq!(
                probe.history(),
                vec!["navigate:http://app/login", "click:el-1", "close"]
            );
            assert!(probe.was_called("navigate"));
            assert_eq!(probe.close_count(), 1);
        }

        #[tokio::test]
        async fn test_closed_driver_rejects_calls() {
            let mut driver = MockDriver::new();
            driver.close().await.unwrap();

            assert_eq!(
                driver.navigate("http://app").await.unwrap_err(),
                DriverError::SessionClosed
            );
            assert_eq!(driver.close().await.unwrap_err(), DriverError::SessionClosed);
            assert_eq!(driver.close_count(), 2);
        }
    }

    mod factory_tests {
        use super::*;

        #[tokio::test]
        async fn test_factory_builds_fresh_documents() {
            let factory = MockSessionFactory::new(|| {
                let driver = MockDriver::new();
                driver.add(MockElement::new(email()));
                driver
            });

            let mut first = factory.open().await.unwrap();
            first.close().await.unwrap();
            let mut second = factory.open().await.unwrap();
            assert!(find(second.driver_mut(), &email()).await.is_some());
            second.close().await.unwrap();

            let opened = factory.opened();
            assert_eq!(opened.len(), 2);
            assert!(opened.iter().all(|d| d.close_count() == 1));
        }

        #[tokio::test]
        async fn test_failing_factory() {
            let factory = MockSessionFactory::failing("chromium not found");
            let err = factory.open().await.unwrap_err();
            assert!(err.to_string().contains("chromium not found"));
            assert!(factory.opened().is_empty());
        }
    }
}
