//! Run configuration: target instance, auth mode, credentials and wait budgets.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::key::{CacheKey, KeyBinding};

pub const ENV_GRID: &str = "GRID";
pub const ENV_BASE_URL: &str = "GRID_BASE_URL";
pub const ENV_AUTH_MODE: &str = "GRID_AUTH_MODE";
pub const ENV_EMAIL: &str = "GRID_EMAIL";
pub const ENV_OTP_SECRET: &str = "GRID_OTP_SECRET";
pub const ENV_AUTH_DIR: &str = "GRID_AUTH_DIR";
pub const ENV_KEY_BINDING: &str = "GRID_KEY_BINDING";
pub const ENV_LANDMARK_TIMEOUT_MS: &str = "GRID_LANDMARK_TIMEOUT_MS";
pub const ENV_INTERACTIVE_WAIT_MS: &str = "GRID_INTERACTIVE_WAIT_MS";

pub const DEFAULT_GRID: &str = "main";
pub const DEFAULT_BASE_URL: &str = "https://grid.nga.mil/grid";
pub const DEFAULT_AUTH_DIR: &str = ".auth";
pub const DEFAULT_LANDMARK_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_INTERACTIVE_WAIT: Duration = Duration::from_secs(10);

/// How the login flow proves identity to the site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
	/// PKI certificate picked by a human in the browser prompt.
	#[default]
	Interactive,
	/// Email plus time-based one-time password, no human involved.
	Scripted,
}

impl FromStr for AuthMode {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		match s.trim().to_ascii_lowercase().as_str() {
			"interactive" | "pki" | "cac" => Ok(AuthMode::Interactive),
			"scripted" | "otp" | "totp" => Ok(AuthMode::Scripted),
			other => Err(Error::Config(format!(
				"{ENV_AUTH_MODE} must be `interactive` or `scripted`, got `{other}`"
			))),
		}
	}
}

/// Credentials the scripted login needs, validated as present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedCredentials {
	pub email: String,
	pub otp_secret: String,
}

/// Everything a run needs to know about the target and how to log in.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
	pub grid: String,
	pub base_url: String,
	pub mode: AuthMode,
	pub email: Option<String>,
	pub otp_secret: Option<String>,
	pub auth_dir: PathBuf,
	pub key_binding: KeyBinding,
	pub landmark_timeout: Duration,
	pub interactive_wait: Duration,
}

impl Default for RunConfig {
	fn default() -> Self {
		Self {
			grid: DEFAULT_GRID.to_string(),
			base_url: DEFAULT_BASE_URL.to_string(),
			mode: AuthMode::default(),
			email: None,
			otp_secret: None,
			auth_dir: PathBuf::from(DEFAULT_AUTH_DIR),
			key_binding: KeyBinding::default(),
			landmark_timeout: DEFAULT_LANDMARK_TIMEOUT,
			interactive_wait: DEFAULT_INTERACTIVE_WAIT,
		}
	}
}

impl RunConfig {
	/// Loads configuration from process environment variables.
	pub fn from_env() -> Result<Self> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Loads configuration through `lookup`, falling back to defaults for unset values.
	///
	/// Empty values count as unset.
	pub fn from_lookup<F>(lookup: F) -> Result<Self>
	where
		F: Fn(&str) -> Option<String>,
	{
		let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
		let mut config = Self::default();

		if let Some(grid) = get(ENV_GRID) {
			config.grid = grid;
		}
		if let Some(url) = get(ENV_BASE_URL) {
			config = config.with_base_url(url);
		}
		if let Some(mode) = get(ENV_AUTH_MODE) {
			config.mode = mode.parse()?;
		}
		config.email = get(ENV_EMAIL);
		config.otp_secret = get(ENV_OTP_SECRET);
		if let Some(dir) = get(ENV_AUTH_DIR) {
			config.auth_dir = PathBuf::from(dir);
		}
		if let Some(binding) = get(ENV_KEY_BINDING) {
			config.key_binding = parse_binding(&binding)?;
		}
		if let Some(ms) = get(ENV_LANDMARK_TIMEOUT_MS) {
			config.landmark_timeout = parse_millis(ENV_LANDMARK_TIMEOUT_MS, &ms)?;
		}
		if let Some(ms) = get(ENV_INTERACTIVE_WAIT_MS) {
			config.interactive_wait = parse_millis(ENV_INTERACTIVE_WAIT_MS, &ms)?;
		}

		CacheKey::new(&config.grid)?;
		config.url("")?;
		Ok(config)
	}

	pub fn with_grid(mut self, grid: impl Into<String>) -> Self {
		self.grid = grid.into();
		self
	}

	/// Sets the site root; a trailing slash is dropped.
	pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
		self.base_url = url.into().trim_end_matches('/').to_string();
		self
	}

	pub fn with_mode(mut self, mode: AuthMode) -> Self {
		self.mode = mode;
		self
	}

	pub fn with_credentials(mut self, email: impl Into<String>, otp_secret: impl Into<String>) -> Self {
		self.email = Some(email.into());
		self.otp_secret = Some(otp_secret.into());
		self
	}

	pub fn with_auth_dir(mut self, dir: impl Into<PathBuf>) -> Self {
		self.auth_dir = dir.into();
		self
	}

	pub fn with_key_binding(mut self, binding: KeyBinding) -> Self {
		self.key_binding = binding;
		self
	}

	pub fn with_landmark_timeout(mut self, timeout: Duration) -> Self {
		self.landmark_timeout = timeout;
		self
	}

	pub fn with_interactive_wait(mut self, wait: Duration) -> Self {
		self.interactive_wait = wait;
		self
	}

	/// Absolute URL for `path`.
	///
	/// A leading `/` resolves against the base URL's origin, so `/grid/map`
	/// is the map page whatever the base path. Other relative paths resolve
	/// below the base URL; absolute URLs pass through.
	pub fn url(&self, path: &str) -> Result<String> {
		let base = Url::parse(&format!("{}/", self.base_url))
			.map_err(|e| Error::Config(format!("invalid base URL '{}': {e}", self.base_url)))?;
		let url = base
			.join(path)
			.map_err(|e| Error::Config(format!("failed to join '{path}' with base '{}': {e}", self.base_url)))?;
		Ok(url.into())
	}

	/// URL of a REST endpoint, e.g. `api_url("mapexport")`.
	pub fn api_url(&self, endpoint: &str) -> String {
		format!("{}/api/drf/{}", self.base_url, endpoint.trim_start_matches('/'))
	}

	/// Returns the scripted-mode credentials or names the first one missing.
	pub fn scripted_credentials(&self, key: &CacheKey) -> Result<ScriptedCredentials> {
		let email = self.email.clone().filter(|v| !v.trim().is_empty()).ok_or_else(|| Error::MissingCredential {
			key: key.clone(),
			field: ENV_EMAIL,
		})?;
		let otp_secret = self
			.otp_secret
			.clone()
			.filter(|v| !v.trim().is_empty())
			.ok_or_else(|| Error::MissingCredential {
				key: key.clone(),
				field: ENV_OTP_SECRET,
			})?;
		Ok(ScriptedCredentials { email, otp_secret })
	}
}

fn parse_millis(name: &str, value: &str) -> Result<Duration> {
	value
		.parse::<u64>()
		.map(Duration::from_millis)
		.map_err(|_| Error::Config(format!("{name} must be a whole number of milliseconds, got `{value}`")))
}

fn parse_binding(value: &str) -> Result<KeyBinding> {
	match value {
		"target" => Ok(KeyBinding::PerTarget),
		"worker" => Ok(KeyBinding::PerWorker),
		other => match other.strip_prefix("shared:") {
			Some(name) => Ok(KeyBinding::Shared(CacheKey::new(name)?)),
			None => Err(Error::Config(format!(
				"{ENV_KEY_BINDING} must be `target`, `worker` or `shared:<key>`, got `{other}`"
			))),
		},
	}
}

#[cfg(test)]
mod tests {
	use std::collections::HashMap;

	use super::*;

	fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
		move |name| map.get(name).cloned()
	}

	#[test]
	fn defaults_when_environment_is_empty() {
		let config = RunConfig::from_lookup(lookup(&[])).unwrap();
		assert_eq!(config, RunConfig::default());
		assert_eq!(config.mode, AuthMode::Interactive);
		assert_eq!(config.interactive_wait, Duration::from_secs(10));
	}

	#[test]
	fn reads_every_variable() {
		let config = RunConfig::from_lookup(lookup(&[
			(ENV_GRID, "staging"),
			(ENV_BASE_URL, "https://grid.example.test/"),
			(ENV_AUTH_MODE, "Scripted"),
			(ENV_EMAIL, "qa@example.test"),
			(ENV_OTP_SECRET, "JBSWY3DPEHPK3PXP"),
			(ENV_AUTH_DIR, "/tmp/auth"),
			(ENV_KEY_BINDING, "worker"),
			(ENV_LANDMARK_TIMEOUT_MS, "500"),
			(ENV_INTERACTIVE_WAIT_MS, "250"),
		]))
		.unwrap();

		assert_eq!(config.grid, "staging");
		assert_eq!(config.base_url, "https://grid.example.test");
		assert_eq!(config.mode, AuthMode::Scripted);
		assert_eq!(config.auth_dir, PathBuf::from("/tmp/auth"));
		assert_eq!(config.key_binding, KeyBinding::PerWorker);
		assert_eq!(config.landmark_timeout, Duration::from_millis(500));
		assert_eq!(config.interactive_wait, Duration::from_millis(250));
	}

	#[test]
	fn rejects_bad_values() {
		assert!(matches!(
			RunConfig::from_lookup(lookup(&[(ENV_AUTH_MODE, "magic")])),
			Err(Error::Config(_))
		));
		assert!(matches!(
			RunConfig::from_lookup(lookup(&[(ENV_LANDMARK_TIMEOUT_MS, "soon")])),
			Err(Error::Config(_))
		));
		assert!(matches!(
			RunConfig::from_lookup(lookup(&[(ENV_GRID, "../x")])),
			Err(Error::InvalidCacheKey { .. })
		));
	}

	#[test]
	fn shared_binding_from_env() {
		let config = RunConfig::from_lookup(lookup(&[(ENV_KEY_BINDING, "shared:cookies")])).unwrap();
		assert_eq!(config.key_binding, KeyBinding::Shared(CacheKey::new("cookies").unwrap()));
	}

	#[test]
	fn builds_site_and_api_urls() {
		let config = RunConfig::default().with_base_url("https://grid.example.test/");
		assert_eq!(config.url("/grid/map").unwrap(), "https://grid.example.test/grid/map");
		assert_eq!(config.api_url("aois?*"), "https://grid.example.test/api/drf/aois?*");
		assert_eq!(config.url("https://other.test/x").unwrap(), "https://other.test/x");
	}

	#[test]
	fn site_paths_resolve_against_origin_of_default_base() {
		let config = RunConfig::default();
		assert_eq!(config.url("/grid/map").unwrap(), "https://grid.nga.mil/grid/map");
		assert_eq!(config.url("map").unwrap(), "https://grid.nga.mil/grid/map");
		assert_eq!(config.url("").unwrap(), "https://grid.nga.mil/grid/");
		assert_eq!(config.api_url("mapexport"), "https://grid.nga.mil/grid/api/drf/mapexport");
	}

	#[test]
	fn rejects_unparseable_base_url() {
		assert!(matches!(
			RunConfig::from_lookup(lookup(&[(ENV_BASE_URL, "not a url")])),
			Err(Error::Config(_))
		));
		assert!(RunConfig::default().with_base_url("grid.example.test").url("/").is_err());
	}

	#[test]
	fn scripted_credentials_name_the_missing_field() {
		let key = CacheKey::new("main").unwrap();
		let config = RunConfig::default().with_mode(AuthMode::Scripted);
		match config.scripted_credentials(&key) {
			Err(Error::MissingCredential { field, .. }) => assert_eq!(field, ENV_EMAIL),
			other => panic!("expected MissingCredential, got {other:?}"),
		}

		let mut config = config.with_credentials("qa@example.test", "  ");
		match config.scripted_credentials(&key) {
			Err(Error::MissingCredential { field, .. }) => assert_eq!(field, ENV_OTP_SECRET),
			other => panic!("expected MissingCredential, got {other:?}"),
		}

		config.otp_secret = Some("JBSWY3DPEHPK3PXP".into());
		let creds = config.scripted_credentials(&key).unwrap();
		assert_eq!(creds.email, "qa@example.test");
	}
}
