//! Cookie and storage state types for persisted login sessions.
//!
//! A [`StorageState`] is the artifact written after a successful login and
//! handed back to every browsing context that should start authenticated.

use serde::{Deserialize, Serialize};

/// SameSite cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SameSite {
	#[serde(rename = "None")]
	None,
	#[default]
	#[serde(rename = "Lax")]
	Lax,
	#[serde(rename = "Strict")]
	Strict,
}

/// A browser cookie as exported by the automation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
	pub name: String,
	pub value: String,

	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub domain: Option<String>,

	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub path: Option<String>,

	/// Unix timestamp in seconds (-1 means session cookie)
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub expires: Option<f64>,

	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub http_only: Option<bool>,

	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub secure: Option<bool>,

	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub same_site: Option<SameSite>,
}

impl Cookie {
	/// Creates a cookie scoped to `domain` with root path.
	pub fn new(name: impl Into<String>, value: impl Into<String>, domain: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			value: value.into(),
			domain: Some(domain.into()),
			path: Some("/".into()),
			expires: None,
			http_only: None,
			secure: None,
			same_site: None,
		}
	}

	pub fn expires(mut self, expires: f64) -> Self {
		self.expires = Some(expires);
		self
	}

	pub fn http_only(mut self, http_only: bool) -> Self {
		self.http_only = Some(http_only);
		self
	}

	pub fn secure(mut self, secure: bool) -> Self {
		self.secure = Some(secure);
		self
	}

	pub fn same_site(mut self, same_site: SameSite) -> Self {
		self.same_site = Some(same_site);
		self
	}

	/// Returns true for cookies without an expiry (or with the `-1` marker).
	pub fn is_session(&self) -> bool {
		self.expires.is_none_or(|ts| ts < 0.0)
	}
}

/// A key/value entry in origin-scoped web storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEntry {
	pub name: String,
	pub value: String,
}

/// Web storage captured for a single origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginState {
	pub origin: String,
	#[serde(default)]
	pub local_storage: Vec<StorageEntry>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub session_storage: Vec<StorageEntry>,
}

/// Complete authenticated browser state.
///
/// Serialized as `{"cookies": [...], "origins": [...]}`, the exact shape the
/// browser context restore operation accepts. `origins` is empty when the
/// site keeps nothing in web storage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageState {
	pub cookies: Vec<Cookie>,
	#[serde(default)]
	pub origins: Vec<OriginState>,
}

impl StorageState {
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a storage state with cookies only.
	pub fn with_cookies(cookies: Vec<Cookie>) -> Self {
		Self {
			cookies,
			origins: Vec::new(),
		}
	}

	/// Parses a persisted artifact.
	pub fn from_json(content: &str) -> serde_json::Result<Self> {
		serde_json::from_str(content)
	}

	/// Renders the artifact in its on-disk form.
	pub fn to_json_pretty(&self) -> serde_json::Result<String> {
		serde_json::to_string_pretty(self)
	}

	pub fn is_empty(&self) -> bool {
		self.cookies.is_empty() && self.origins.is_empty()
	}
}
