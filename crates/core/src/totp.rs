//! RFC 6238 one-time passwords for the scripted login.

use std::time::{SystemTime, UNIX_EPOCH};

use totp_rs::{Algorithm, Secret, TOTP};

use crate::error::{Error, Result};

pub const TOTP_DIGITS: usize = 6;
pub const TOTP_STEP_SECS: u64 = 30;

/// Code generator for one shared secret: HMAC-SHA1, 30 s step, 6 digits.
#[derive(Debug, Clone)]
pub struct Totp {
	inner: TOTP,
}

impl Totp {
	/// Builds a generator from a base32 seed as shown by authenticator enrollment.
	///
	/// Whitespace, dashes, lowercase and `=` padding are tolerated.
	pub fn from_base32(seed: &str) -> Result<Self> {
		let normalized: String = seed
			.chars()
			.filter(|c| !c.is_whitespace() && *c != '-' && *c != '=')
			.map(|c| c.to_ascii_uppercase())
			.collect();
		if normalized.is_empty() {
			return Err(Error::InvalidOtpSecret("seed is empty".into()));
		}
		let bytes = Secret::Encoded(normalized)
			.to_bytes()
			.map_err(|e| Error::InvalidOtpSecret(format!("{e:?}")))?;
		Ok(Self::from_bytes(bytes))
	}

	/// Builds a generator from the raw shared secret.
	pub fn from_bytes(secret: impl Into<Vec<u8>>) -> Self {
		Self {
			inner: TOTP::new_unchecked(Algorithm::SHA1, TOTP_DIGITS, 1, TOTP_STEP_SECS, secret.into()),
		}
	}

	/// Code for the time step containing `unix_secs`.
	pub fn code_at(&self, unix_secs: u64) -> String {
		self.inner.generate(unix_secs)
	}

	/// Code for the current time step.
	pub fn current(&self) -> String {
		self.code_at(now_unix())
	}
}

/// Computes the code for `secret` (base32) at `time`.
pub fn compute_totp(secret: &str, time: SystemTime) -> Result<String> {
	let secs = time
		.duration_since(UNIX_EPOCH)
		.map_err(|_| Error::Config("time is before the Unix epoch".into()))?
		.as_secs();
	Ok(Totp::from_base32(secret)?.code_at(secs))
}

/// Seconds left before the code for `unix_secs` rolls over.
pub fn seconds_remaining(unix_secs: u64) -> u64 {
	TOTP_STEP_SECS - unix_secs % TOTP_STEP_SECS
}

pub(crate) fn now_unix() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_secs())
		.unwrap_or(0)
}
