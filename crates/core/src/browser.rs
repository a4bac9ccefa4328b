//! Browser automation seam.
//!
//! The session cache drives a real browser only through these traits:
//! [`BrowserLauncher`] opens isolated contexts and [`BrowserSession`] performs
//! the handful of page operations the login flow needs. Adapters over a
//! concrete automation engine implement them; [`crate::testing`] provides
//! in-process doubles.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use grid_protocol::StorageState;
use thiserror::Error;

use crate::intercept::BodyInterceptor;
use crate::locator::Locator;

/// Interval between visibility checks in [`BrowserSession::wait_for_visible`].
pub const VISIBILITY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Failure reported by the automation engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrowserError {
	#[error("timeout after {ms}ms waiting for {what}")]
	Timeout { ms: u64, what: String },

	#[error("element not found: {0}")]
	NotFound(String),

	#[error("{0}")]
	Failed(String),
}

pub type BrowserResult<T> = std::result::Result<T, BrowserError>;

/// Opens isolated browsing contexts.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
	/// Opens a new context with one page.
	///
	/// `None` means explicitly no storage state: a clean, logged-out context.
	async fn new_session(&self, storage_state: Option<&StorageState>) -> BrowserResult<Box<dyn BrowserSession>>;
}

/// One browsing context with a single active page.
#[async_trait]
pub trait BrowserSession: Send + Sync {
	async fn goto(&self, url: &str, timeout: Duration) -> BrowserResult<()>;

	async fn click(&self, locator: &Locator, timeout: Duration) -> BrowserResult<()>;

	async fn fill(&self, locator: &Locator, value: &str, timeout: Duration) -> BrowserResult<()>;

	/// Checks visibility right now without waiting.
	async fn is_visible(&self, locator: &Locator) -> BrowserResult<bool>;

	/// Waits until `locator` is visible or `timeout` elapses.
	///
	/// The default polls [`is_visible`](Self::is_visible); engines with native
	/// waiting should override it.
	async fn wait_for_visible(&self, locator: &Locator, timeout: Duration) -> BrowserResult<()> {
		let deadline = tokio::time::Instant::now() + timeout;
		loop {
			if self.is_visible(locator).await? {
				return Ok(());
			}
			let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
			if remaining.is_zero() {
				return Err(BrowserError::Timeout {
					ms: timeout.as_millis() as u64,
					what: locator.selector(),
				});
			}
			tokio::time::sleep(remaining.min(VISIBILITY_POLL_INTERVAL)).await;
		}
	}

	/// Waits until any of `locators` is visible and returns the index of the
	/// first one seen.
	///
	/// Candidates are checked in order on each poll, so an earlier locator
	/// wins when several are visible at once.
	async fn wait_for_any(&self, locators: &[&Locator], timeout: Duration) -> BrowserResult<usize> {
		let deadline = tokio::time::Instant::now() + timeout;
		loop {
			for (index, locator) in locators.iter().enumerate() {
				if self.is_visible(locator).await? {
					return Ok(index);
				}
			}
			let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
			if remaining.is_zero() {
				let what = locators.iter().map(|l| l.selector()).collect::<Vec<_>>().join(" | ");
				return Err(BrowserError::Timeout {
					ms: timeout.as_millis() as u64,
					what,
				});
			}
			tokio::time::sleep(remaining.min(VISIBILITY_POLL_INTERVAL)).await;
		}
	}

	/// Registers `interceptor` for requests matching its URL pattern.
	async fn route(&self, interceptor: Arc<BodyInterceptor>) -> BrowserResult<()>;

	/// Exports cookies and origin storage of this context.
	async fn storage_state(&self) -> BrowserResult<StorageState>;

	async fn close(self: Box<Self>) -> BrowserResult<()>;
}
