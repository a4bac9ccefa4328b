//! In-process browser doubles.
//!
//! [`MockSite`] describes a fake GRiD deployment: which elements are visible
//! up front, which clicks reveal which elements, and which click completes the
//! login. [`MockLauncher`] opens [`MockSession`]s over a site and counts what
//! happened so tests can assert on launches, logins and restores.
//!
//! ```ignore
//! use grid::testing::{MockLauncher, MockSite};
//!
//! let launcher = Arc::new(MockLauncher::new(MockSite::grid()));
//! let provider = SessionCacheProvider::new(config, launcher.clone());
//! provider.acquire_for_worker(0).await?;
//! assert_eq!(launcher.logins(), 1);
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use grid_protocol::{Cookie, InterceptedRequest, OriginState, RouteDecision, StorageEntry, StorageState};
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::browser::{BrowserError, BrowserLauncher, BrowserResult, BrowserSession};
use crate::intercept::BodyInterceptor;
use crate::locator::Locator;
use crate::login::LoginPlan;

/// Cookie the mock site issues on login.
pub const MOCK_SESSION_COOKIE: &str = "sessionid";
pub const MOCK_ORIGIN: &str = "https://grid.example.test";

/// Action recorded by [`MockSession`] for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockAction {
	Goto { url: String },
	Click { selector: String },
	Fill { selector: String, text: String },
}

/// A revealed element, visible after `delay`.
#[derive(Debug, Clone)]
struct Reveal {
	selector: String,
	delay: Option<Duration>,
}

/// Behaviour of the fake site.
#[derive(Debug, Clone)]
pub struct MockSite {
	initially_visible: Vec<String>,
	reveals: HashMap<String, Vec<Reveal>>,
	completes_login: Vec<String>,
	certificate_prompt: String,
	code_submit: String,
	authenticated_only: Vec<String>,
	login_delay: Duration,
	navigation_error: Option<String>,
}

impl MockSite {
	/// A site shaped like GRiD for the default [`LoginPlan`].
	pub fn grid() -> Self {
		Self::for_plan(&LoginPlan::default())
	}

	/// A site whose elements are the locators of `plan`.
	///
	/// The certificate prompt is answered immediately; scripted logins
	/// complete on the one-time-password submit.
	pub fn for_plan(plan: &LoginPlan) -> Self {
		let sel = |l: &Locator| l.selector();
		let now = |l: &Locator| Reveal {
			selector: l.selector(),
			delay: Some(Duration::ZERO),
		};
		let mut reveals = HashMap::new();
		reveals.insert(
			sel(&plan.login_link),
			vec![now(&plan.pki_link), now(&plan.email_field), now(&plan.email_submit)],
		);
		reveals.insert(sel(&plan.pki_link), vec![now(&plan.continue_prompt)]);
		reveals.insert(sel(&plan.email_submit), vec![now(&plan.otp_field), now(&plan.otp_submit)]);

		Self {
			initially_visible: vec![sel(&plan.login_link)],
			reveals,
			completes_login: vec![sel(&plan.continue_prompt), sel(&plan.otp_submit)],
			certificate_prompt: sel(&plan.continue_prompt),
			code_submit: sel(&plan.otp_submit),
			authenticated_only: vec![sel(&plan.landmark)],
			login_delay: Duration::ZERO,
			navigation_error: None,
		}
	}

	/// The human answers the certificate prompt after `delay`; `None` means never.
	pub fn with_certificate_delay(mut self, delay: Option<Duration>) -> Self {
		for reveals in self.reveals.values_mut() {
			for reveal in reveals.iter_mut().filter(|r| r.selector == self.certificate_prompt) {
				reveal.delay = delay;
			}
		}
		self
	}

	/// After the one-time password is submitted the identity provider shows
	/// its continue prompt after `delay`; the login completes only when the
	/// prompt is clicked.
	pub fn with_prompt_after_code(mut self, delay: Duration) -> Self {
		let prompt = self.certificate_prompt.clone();
		self.completes_login.retain(|s| *s == prompt);
		self.reveals.entry(self.code_submit.clone()).or_default().push(Reveal {
			selector: prompt,
			delay: Some(delay),
		});
		self
	}

	/// Completing the login takes `delay`.
	pub fn with_login_delay(mut self, delay: Duration) -> Self {
		self.login_delay = delay;
		self
	}

	/// Login completes but the landmark never renders.
	pub fn without_landmark(mut self) -> Self {
		self.authenticated_only.clear();
		self
	}

	/// Every navigation fails with `message`.
	pub fn with_navigation_error(mut self, message: impl Into<String>) -> Self {
		self.navigation_error = Some(message.into());
		self
	}

	/// State a logged-in session exports.
	pub fn session_state() -> StorageState {
		let mut state = StorageState::with_cookies(vec![
			Cookie::new(MOCK_SESSION_COOKIE, "mock-session", "grid.example.test")
				.http_only(true)
				.secure(true),
		]);
		state.origins.push(OriginState {
			origin: MOCK_ORIGIN.to_string(),
			local_storage: vec![StorageEntry {
				name: "grid.user".to_string(),
				value: "qa".to_string(),
			}],
			session_storage: Vec::new(),
		});
		state
	}
}

/// Counters shared by a launcher and every session it opened.
#[derive(Debug, Default)]
struct Counters {
	opened: AtomicUsize,
	restored: AtomicUsize,
	logins: AtomicUsize,
	closed: AtomicUsize,
	actions: Mutex<Vec<MockAction>>,
}

/// Opens [`MockSession`]s over one [`MockSite`].
#[derive(Debug)]
pub struct MockLauncher {
	site: Arc<MockSite>,
	counters: Arc<Counters>,
	launch_error: Mutex<Option<String>>,
}

impl MockLauncher {
	pub fn new(site: MockSite) -> Self {
		Self {
			site: Arc::new(site),
			counters: Arc::new(Counters::default()),
			launch_error: Mutex::new(None),
		}
	}

	/// Makes every later launch fail with `message`.
	pub fn fail_launches(&self, message: impl Into<String>) {
		*self.launch_error.lock() = Some(message.into());
	}

	/// Sessions opened, restored or not.
	pub fn sessions_opened(&self) -> usize {
		self.counters.opened.load(Ordering::SeqCst)
	}

	/// Sessions opened with a storage state.
	pub fn restored_sessions(&self) -> usize {
		self.counters.restored.load(Ordering::SeqCst)
	}

	/// Logins completed against the site.
	pub fn logins(&self) -> usize {
		self.counters.logins.load(Ordering::SeqCst)
	}

	pub fn sessions_closed(&self) -> usize {
		self.counters.closed.load(Ordering::SeqCst)
	}

	/// Every action performed by every session, in order.
	pub fn actions(&self) -> Vec<MockAction> {
		self.counters.actions.lock().clone()
	}
}

#[async_trait]
impl BrowserLauncher for MockLauncher {
	async fn new_session(&self, storage_state: Option<&StorageState>) -> BrowserResult<Box<dyn BrowserSession>> {
		if let Some(message) = self.launch_error.lock().clone() {
			return Err(BrowserError::Failed(message));
		}
		self.counters.opened.fetch_add(1, Ordering::SeqCst);
		if storage_state.is_some() {
			self.counters.restored.fetch_add(1, Ordering::SeqCst);
		}
		let session = MockSession::with_counters(self.site.clone(), self.counters.clone(), storage_state);
		Ok(Box::new(session))
	}
}

/// One fake browsing context.
#[derive(Debug)]
pub struct MockSession {
	site: Arc<MockSite>,
	counters: Arc<Counters>,
	visible_from: Mutex<HashMap<String, Instant>>,
	authenticated: Mutex<bool>,
	interceptors: Mutex<Vec<Arc<BodyInterceptor>>>,
}

impl MockSession {
	/// A logged-out session over `site`.
	pub fn new(site: MockSite) -> Self {
		Self::with_counters(Arc::new(site), Arc::new(Counters::default()), None)
	}

	fn with_counters(site: Arc<MockSite>, counters: Arc<Counters>, storage_state: Option<&StorageState>) -> Self {
		let authenticated = storage_state
			.is_some_and(|state| state.cookies.iter().any(|c| c.name == MOCK_SESSION_COOKIE));
		let now = Instant::now();
		let visible_from = site.initially_visible.iter().map(|s| (s.clone(), now)).collect();
		Self {
			site,
			counters,
			visible_from: Mutex::new(visible_from),
			authenticated: Mutex::new(authenticated),
			interceptors: Mutex::new(Vec::new()),
		}
	}

	pub fn is_authenticated(&self) -> bool {
		*self.authenticated.lock()
	}

	/// Sends `request` through the registered interceptors as the page would.
	///
	/// The first interceptor whose pattern matches decides; unmatched requests
	/// continue unchanged.
	pub fn dispatch(&self, request: &InterceptedRequest) -> RouteDecision {
		let interceptors = self.interceptors.lock().clone();
		interceptors
			.iter()
			.find(|i| i.matches(&request.url))
			.map(|i| i.decide(request))
			.unwrap_or_else(RouteDecision::passthrough)
	}

	fn record(&self, action: MockAction) {
		self.counters.actions.lock().push(action);
	}

	fn visible_now(&self, selector: &str) -> bool {
		if self.site.authenticated_only.iter().any(|s| s == selector) {
			return self.is_authenticated();
		}
		self.visible_from
			.lock()
			.get(selector)
			.is_some_and(|from| Instant::now() >= *from)
	}

	fn require_visible(&self, locator: &Locator, timeout: Duration) -> BrowserResult<String> {
		let selector = locator.selector();
		if self.visible_now(&selector) {
			Ok(selector)
		} else {
			Err(BrowserError::Timeout {
				ms: timeout.as_millis() as u64,
				what: selector,
			})
		}
	}
}

#[async_trait]
impl BrowserSession for MockSession {
	async fn goto(&self, url: &str, _timeout: Duration) -> BrowserResult<()> {
		self.record(MockAction::Goto { url: url.to_string() });
		match &self.site.navigation_error {
			Some(message) => Err(BrowserError::Failed(message.clone())),
			None => Ok(()),
		}
	}

	async fn click(&self, locator: &Locator, timeout: Duration) -> BrowserResult<()> {
		let selector = self.require_visible(locator, timeout)?;
		self.record(MockAction::Click {
			selector: selector.clone(),
		});

		if let Some(reveals) = self.site.reveals.get(&selector) {
			let now = Instant::now();
			let mut visible = self.visible_from.lock();
			for reveal in reveals {
				if let Some(delay) = reveal.delay {
					visible.entry(reveal.selector.clone()).or_insert(now + delay);
				}
			}
		}

		if self.site.completes_login.contains(&selector) && !self.is_authenticated() {
			if !self.site.login_delay.is_zero() {
				tokio::time::sleep(self.site.login_delay).await;
			}
			*self.authenticated.lock() = true;
			self.counters.logins.fetch_add(1, Ordering::SeqCst);
		}
		Ok(())
	}

	async fn fill(&self, locator: &Locator, value: &str, timeout: Duration) -> BrowserResult<()> {
		let selector = self.require_visible(locator, timeout)?;
		self.record(MockAction::Fill {
			selector,
			text: value.to_string(),
		});
		Ok(())
	}

	async fn is_visible(&self, locator: &Locator) -> BrowserResult<bool> {
		Ok(self.visible_now(&locator.selector()))
	}

	async fn route(&self, interceptor: Arc<BodyInterceptor>) -> BrowserResult<()> {
		self.interceptors.lock().push(interceptor);
		Ok(())
	}

	async fn storage_state(&self) -> BrowserResult<StorageState> {
		if self.is_authenticated() {
			Ok(MockSite::session_state())
		} else {
			Ok(StorageState::new())
		}
	}

	async fn close(self: Box<Self>) -> BrowserResult<()> {
		self.counters.closed.fetch_add(1, Ordering::SeqCst);
		Ok(())
	}
}
