//! Browser sessions.
//!
//! A [`Session`] wraps one driver for the duration of one scenario. The
//! executor owns it exclusively and closes it on every exit path; closing
//! twice is a no-op, so teardown reaches the driver exactly once.

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::driver::{BrowserDriver, DriverResult};
use crate::result::WardwalkResult;

/// Live browser context owned by a single scenario run
#[derive(Debug)]
pub struct Session<D: BrowserDriver> {
    id: Uuid,
    driver: D,
    opened_at: Instant,
    closed: bool,
}

impl<D: BrowserDriver> Session<D> {
    /// Wrap an already-connected driver
    #[must_use]
    pub fn new(driver: D) -> Self {
        let id = Uuid::new_v4();
        debug!(session = %id, "session opened");
        Self {
            id,
            driver,
            opened_at: Instant::now(),
            closed: false,
        }
    }

    /// Session identifier
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Whether [`close`](Self::close) has run
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Driver for issuing commands
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Tear the session down; later calls do nothing
    pub async fn close(&mut self) -> DriverResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let result = self.driver.close().await;
        debug!(
            session = %self.id,
            lifetime_ms = self.opened_at.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "session closed"
        );
        result
    }
}

impl<D: BrowserDriver> Drop for Session<D> {
    fn drop(&mut self) {
        if !self.closed {
            warn!(session = %self.id, "session dropped without being closed");
        }
    }
}

/// Opens a fresh session per scenario
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Driver the sessions wrap
    type Driver: BrowserDriver;

    /// Open a new, independent session
    async fn open(&self) -> WardwalkResult<Session<Self::Driver>>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::driver::DriverError;
    use crate::mock::MockDriver;

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let driver = MockDriver::new();
        let mut session = Session::new(driver.clone());

        session.close().await.unwrap();
        session.close().await.unwrap();
        assert!(session.is_closed());
        assert_eq!(driver.close_count(), 1);
    }

    #[tokio::test]
    async fn test_close_failure_still_marks_closed() {
        let driver = MockDriver::new();
        driver.close_now();
        let mut session = Session::new(driver.clone());

        assert_eq!(session.close().await.unwrap_err(), DriverError::SessionClosed);
        assert!(session.is_closed());
        session.close().await.unwrap();
        assert_eq!(driver.close_count(), 1);
    }

    #[test]
    fn test_sessions_have_distinct_ids() {
        let a = Session::new(MockDriver::new());
        let b = Session::new(MockDriver::new());
        assert_ne!(a.id(), b.id());
    }
}
