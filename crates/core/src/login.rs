//! The GRiD login flow, expressed against [`BrowserSession`].

use std::time::Duration;

use tracing::{debug, info};

use crate::browser::{BrowserError, BrowserSession};
use crate::config::{AuthMode, RunConfig};
use crate::error::{Error, LoginStage, Result};
use crate::key::CacheKey;
use crate::locator::{Locator, TextMatch};
use crate::totp::{Totp, now_unix, seconds_remaining};

/// Codes this close to rollover are skipped in favour of the next window.
const MIN_CODE_LIFETIME_SECS: u64 = 3;

/// Timestamp whose code gets submitted when the clock reads `now`.
///
/// Codes with fewer than [`MIN_CODE_LIFETIME_SECS`] left are skipped for the
/// start of the next window.
fn code_time(now: u64) -> u64 {
	let remaining = seconds_remaining(now);
	if remaining < MIN_CODE_LIFETIME_SECS { now + remaining } else { now }
}

/// Locators and paths the login flow walks through.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginPlan {
	/// Page that shows the login entry link; empty is the base URL itself.
	pub entry_path: String,
	pub login_link: Locator,
	pub pki_link: Locator,
	pub email_field: Locator,
	pub email_submit: Locator,
	pub otp_field: Locator,
	pub otp_submit: Locator,
	/// Prompt shown by the identity provider once it accepted the user.
	pub continue_prompt: Locator,
	/// Visible only to an authenticated user.
	pub landmark: Locator,
	/// Budget for each click/fill/navigation.
	pub step_timeout: Duration,
}

impl Default for LoginPlan {
	fn default() -> Self {
		Self {
			entry_path: String::new(),
			login_link: Locator::role("link").named("CAC / GEOAxIS Signup / Login"),
			pki_link: Locator::role("link").named("Sign in with PKI Certificate"),
			email_field: Locator::label("Email"),
			email_submit: Locator::role("button").named(TextMatch::exact("Next")),
			otp_field: Locator::label("One-time passcode"),
			otp_submit: Locator::role("button").named(TextMatch::exact("Verify")),
			continue_prompt: Locator::text("Continue to application"),
			landmark: Locator::css("#navbarToggle").locator(Locator::role("link").named("Map")),
			step_timeout: Duration::from_secs(15),
		}
	}
}

/// Identity material for one login attempt, validated before any browser opens.
#[derive(Debug, Clone)]
pub enum Credentials {
	/// A human completes the certificate prompt.
	Interactive,
	Scripted { email: String, totp: Totp },
}

impl Credentials {
	/// Resolves what the configured mode needs, failing on missing values.
	pub fn from_config(config: &RunConfig, key: &CacheKey) -> Result<Self> {
		match config.mode {
			AuthMode::Interactive => Ok(Credentials::Interactive),
			AuthMode::Scripted => {
				let creds = config.scripted_credentials(key)?;
				Ok(Credentials::Scripted {
					email: creds.email,
					totp: Totp::from_base32(&creds.otp_secret)?,
				})
			}
		}
	}
}

/// One login attempt for one cache key.
pub(crate) struct LoginFlow<'a> {
	pub plan: &'a LoginPlan,
	pub config: &'a RunConfig,
	pub key: &'a CacheKey,
}

impl LoginFlow<'_> {
	/// Drives `session` from a clean context to the authenticated landmark.
	pub async fn run(&self, session: &dyn BrowserSession, credentials: &Credentials) -> Result<()> {
		let step = self.plan.step_timeout;
		let entry = self.config.url(&self.plan.entry_path)?;
		debug!(target = "grid.login", key = %self.key, url = %entry, "opening login entry");
		session
			.goto(&entry, step)
			.await
			.map_err(|e| self.fail(LoginStage::Navigate, e, step))?;
		self.click(session, &self.plan.login_link, LoginStage::LoginEntry).await?;

		match credentials {
			Credentials::Interactive => {
				self.click(session, &self.plan.pki_link, LoginStage::LoginEntry).await?;
				info!(
					target = "grid.login",
					key = %self.key,
					wait_ms = self.config.interactive_wait.as_millis() as u64,
					"waiting for certificate selection in the browser"
				);
				session
					.wait_for_visible(&self.plan.continue_prompt, self.config.interactive_wait)
					.await
					.map_err(|e| self.fail(LoginStage::InteractiveWait, e, self.config.interactive_wait))?;
				self.click(session, &self.plan.continue_prompt, LoginStage::InteractiveWait).await?;
			}
			Credentials::Scripted { email, totp } => {
				self.fill(session, &self.plan.email_field, email).await?;
				self.click(session, &self.plan.email_submit, LoginStage::Credentials).await?;

				let now = now_unix();
				let at = code_time(now);
				if at > now {
					debug!(target = "grid.login", key = %self.key, wait_secs = at - now, "code about to roll over; waiting for next window");
					tokio::time::sleep(Duration::from_secs(at - now)).await;
				}
				self.fill(session, &self.plan.otp_field, &totp.code_at(at)).await?;
				self.click(session, &self.plan.otp_submit, LoginStage::Credentials).await?;

				// The identity provider may or may not interpose its prompt.
				match session
					.wait_for_any(&[&self.plan.continue_prompt, &self.plan.landmark], step)
					.await
				{
					Ok(0) => self.click(session, &self.plan.continue_prompt, LoginStage::Credentials).await?,
					Ok(_) => {}
					Err(BrowserError::Timeout { .. }) => {
						debug!(target = "grid.login", key = %self.key, "no continue prompt after code submit");
					}
					Err(e) => return Err(self.fail(LoginStage::Credentials, e, step)),
				}
			}
		}

		let budget = self.config.landmark_timeout;
		session
			.wait_for_visible(&self.plan.landmark, budget)
			.await
			.map_err(|e| self.fail(LoginStage::Landmark, e, budget))?;
		info!(target = "grid.login", key = %self.key, "landmark visible; login confirmed");
		Ok(())
	}

	async fn click(&self, session: &dyn BrowserSession, locator: &Locator, stage: LoginStage) -> Result<()> {
		let step = self.plan.step_timeout;
		session.click(locator, step).await.map_err(|e| self.fail(stage, e, step))
	}

	async fn fill(&self, session: &dyn BrowserSession, locator: &Locator, value: &str) -> Result<()> {
		let step = self.plan.step_timeout;
		session
			.fill(locator, value, step)
			.await
			.map_err(|e| self.fail(LoginStage::Credentials, e, step))
	}

	/// Timeouts while waiting on the human or the landmark are authentication
	/// timeouts; anything else is a browser failure at `stage`.
	fn fail(&self, stage: LoginStage, err: BrowserError, budget: Duration) -> Error {
		match (&err, stage) {
			(BrowserError::Timeout { .. }, LoginStage::InteractiveWait | LoginStage::Landmark) => Error::AuthenticationTimeout {
				key: self.key.clone(),
				stage,
				waited_ms: budget.as_millis() as u64,
			},
			_ => Error::Browser {
				key: self.key.clone(),
				stage,
				message: err.to_string(),
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_plan_targets_grid_landmark() {
		let plan = LoginPlan::default();
		assert_eq!(plan.landmark.selector(), r#"#navbarToggle >> internal:role=link[name="Map"i]"#);
		assert_eq!(
			plan.login_link.selector(),
			r#"internal:role=link[name="CAC / GEOAxIS Signup / Login"i]"#
		);
	}

	#[test]
	fn code_near_rollover_uses_next_window() {
		let window_end = 1_700_000_040;
		assert_eq!(window_end % 30, 0);
		assert_eq!(code_time(window_end - 2), window_end);
		assert_eq!(code_time(window_end - 5), window_end - 5);
		assert_eq!(code_time(window_end - 3), window_end - 3);
		assert_eq!(code_time(window_end), window_end);
	}

	#[test]
	fn interactive_needs_no_credentials() {
		let key = CacheKey::new("main").unwrap();
		let creds = Credentials::from_config(&RunConfig::default(), &key).unwrap();
		assert!(matches!(creds, Credentials::Interactive));
	}

	#[test]
	fn scripted_validates_seed_up_front() {
		let key = CacheKey::new("main").unwrap();
		let config = RunConfig::default()
			.with_mode(AuthMode::Scripted)
			.with_credentials("qa@example.test", "!!!");
		assert!(matches!(Credentials::from_config(&config, &key), Err(Error::InvalidOtpSecret(_))));

		let config = RunConfig::default().with_mode(AuthMode::Scripted);
		assert!(matches!(
			Credentials::from_config(&config, &key),
			Err(Error::MissingCredential { .. })
		));
	}
}
