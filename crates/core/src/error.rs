//! Error types for session acquisition and scenario helpers.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::key::CacheKey;

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// How far a login attempt got before it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStage {
	/// Opening the throwaway browsing session.
	OpenSession,
	/// Loading the site's entry page.
	Navigate,
	/// Following the login links to the identity provider.
	LoginEntry,
	/// Submitting email and one-time password.
	Credentials,
	/// Waiting for the human to finish the certificate prompt.
	InteractiveWait,
	/// Waiting for the post-login landmark.
	Landmark,
	/// Exporting and writing the storage state.
	Persist,
}

impl fmt::Display for LoginStage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			LoginStage::OpenSession => "open-session",
			LoginStage::Navigate => "navigate",
			LoginStage::LoginEntry => "login-entry",
			LoginStage::Credentials => "credentials",
			LoginStage::InteractiveWait => "interactive-wait",
			LoginStage::Landmark => "landmark",
			LoginStage::Persist => "persist",
		};
		f.write_str(name)
	}
}

/// Errors surfaced by the session cache and the scenario helpers.
///
/// `Clone` so a failed population can be handed to every worker that was
/// waiting on the same cache key.
#[derive(Debug, Clone, Error)]
pub enum Error {
	#[error("missing credential `{field}` required for scripted login (cache key {key})")]
	MissingCredential { key: CacheKey, field: &'static str },

	#[error("authentication for {key} timed out after {waited_ms}ms at stage {stage}")]
	AuthenticationTimeout {
		key: CacheKey,
		stage: LoginStage,
		waited_ms: u64,
	},

	#[error("session artifact for {key} at {} cannot be restored: {reason}; delete it and re-run", path.display())]
	StaleOrCorruptArtifact {
		key: CacheKey,
		path: PathBuf,
		reason: String,
	},

	#[error("request to {url} failed shape check: {reason}")]
	ApiAssertionMismatch { url: String, reason: String },

	#[error("browser failure for {key} at stage {stage}: {message}")]
	Browser {
		key: CacheKey,
		stage: LoginStage,
		message: String,
	},

	#[error("invalid cache key {key:?}: {reason}")]
	InvalidCacheKey { key: String, reason: &'static str },

	#[error("invalid one-time-password secret: {0}")]
	InvalidOtpSecret(String),

	#[error("configuration error: {0}")]
	Config(String),

	#[error("I/O error: {0}")]
	Io(Arc<std::io::Error>),

	#[error("JSON error: {0}")]
	Json(Arc<serde_json::Error>),
}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		Error::Io(Arc::new(err))
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		Error::Json(Arc::new(err))
	}
}

impl Error {
	/// The login stage the error was raised at, if it came from a login attempt.
	pub fn stage(&self) -> Option<LoginStage> {
		match self {
			Error::AuthenticationTimeout { stage, .. } | Error::Browser { stage, .. } => Some(*stage),
			_ => None,
		}
	}

	/// True for errors caused by configuration rather than the site or browser.
	pub fn is_setup_error(&self) -> bool {
		matches!(
			self,
			Error::MissingCredential { .. } | Error::InvalidCacheKey { .. } | Error::InvalidOtpSecret(_) | Error::Config(_)
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn timeout_message_names_key_and_stage() {
		let err = Error::AuthenticationTimeout {
			key: CacheKey::new("main").unwrap(),
			stage: LoginStage::Landmark,
			waited_ms: 30_000,
		};
		let msg = err.to_string();
		assert!(msg.contains("main"));
		assert!(msg.contains("landmark"));
		assert!(msg.contains("30000ms"));
		assert_eq!(err.stage(), Some(LoginStage::Landmark));
		assert!(!err.is_setup_error());
	}

	#[test]
	fn missing_credential_is_setup_error() {
		let err = Error::MissingCredential {
			key: CacheKey::new("main").unwrap(),
			field: "GRID_OTP_SECRET",
		};
		assert!(err.is_setup_error());
		assert!(err.stage().is_none());
	}
}
