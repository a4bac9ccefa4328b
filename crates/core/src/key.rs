//! Cache keys and the worker-to-key binding.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Identifier selecting which persisted session artifact to use.
///
/// Keys double as file-name stems, so they are restricted to a single path
/// component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CacheKey(Arc<str>);

impl CacheKey {
	pub fn new(key: impl AsRef<str>) -> Result<Self> {
		let raw = key.as_ref();
		let trimmed = raw.trim();
		let reason = if trimmed.is_empty() {
			Some("must not be empty")
		} else if trimmed.contains(['/', '\\']) {
			Some("must not contain path separators")
		} else if trimmed == "." || trimmed.contains("..") {
			Some("must not contain `..`")
		} else if trimmed.chars().any(char::is_control) {
			Some("must not contain control characters")
		} else {
			None
		};

		match reason {
			Some(reason) => Err(Error::InvalidCacheKey {
				key: raw.to_string(),
				reason,
			}),
			None => Ok(Self(Arc::from(trimmed))),
		}
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// File name of the persisted artifact for this key.
	pub fn artifact_file_name(&self) -> String {
		format!("{}-cookies.json", self.0)
	}
}

impl fmt::Display for CacheKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl TryFrom<String> for CacheKey {
	type Error = Error;

	fn try_from(value: String) -> Result<Self> {
		Self::new(value)
	}
}

impl From<CacheKey> for String {
	fn from(key: CacheKey) -> Self {
		key.0.to_string()
	}
}

/// Parallel worker index, as assigned by the test harness.
pub type WorkerId = usize;

/// How workers map onto cache keys.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum KeyBinding {
	/// Every worker shares one fixed key regardless of target.
	Shared(CacheKey),
	/// Workers share a key derived from the configured GRiD instance.
	#[default]
	PerTarget,
	/// Each worker gets its own artifact for the configured instance.
	PerWorker,
}

impl KeyBinding {
	/// Resolves the key `worker` should use against target `grid`.
	pub fn key_for(&self, worker: WorkerId, grid: &str) -> Result<CacheKey> {
		match self {
			KeyBinding::Shared(key) => Ok(key.clone()),
			KeyBinding::PerTarget => CacheKey::new(grid),
			KeyBinding::PerWorker => CacheKey::new(format!("{}-w{worker}", grid.trim())),
		}
	}
}
