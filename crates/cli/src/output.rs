//! Result envelope printed by every command.
//!
//! ```json
//! { "ok": true, "command": "session.show", "data": { ... } }
//! ```
//!
//! On failure `data` is replaced by `error: { "code": "...", "message": "..." }`.

use std::io::{self, Write};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
	#[default]
	Json,
	/// Human-readable text
	Text,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommandResult<T: Serialize> {
	pub ok: bool,
	pub command: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<CommandError>,
}

impl<T: Serialize> CommandResult<T> {
	pub fn success(command: impl Into<String>, data: T) -> Self {
		Self {
			ok: true,
			command: command.into(),
			data: Some(data),
			error: None,
		}
	}

	pub fn failure(command: impl Into<String>, error: CommandError) -> Self {
		Self {
			ok: false,
			command: command.into(),
			data: None,
			error: Some(error),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandError {
	pub code: ErrorCode,
	pub message: String,
}

/// Error codes for scripted handling of failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	InvalidInput,
	/// Stored artifact exists but cannot be restored
	CorruptArtifact,
	/// Required credential not configured
	MissingCredential,
	IoError,
	InternalError,
}

impl std::fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ErrorCode::InvalidInput => write!(f, "INVALID_INPUT"),
			ErrorCode::CorruptArtifact => write!(f, "CORRUPT_ARTIFACT"),
			ErrorCode::MissingCredential => write!(f, "MISSING_CREDENTIAL"),
			ErrorCode::IoError => write!(f, "IO_ERROR"),
			ErrorCode::InternalError => write!(f, "INTERNAL_ERROR"),
		}
	}
}

pub fn print_result<T: Serialize>(result: &CommandResult<T>, format: OutputFormat) {
	match format {
		OutputFormat::Json => {
			if let Ok(json) = serde_json::to_string_pretty(result) {
				println!("{json}");
			}
		}
		OutputFormat::Text => print_result_text(result),
	}
}

fn print_result_text<T: Serialize>(result: &CommandResult<T>) {
	let mut stdout = io::stdout().lock();

	if let Some(ref data) = result.data {
		match serde_json::to_value(data) {
			Ok(serde_json::Value::Object(map)) => {
				for (name, value) in map {
					let _ = match value {
						serde_json::Value::String(s) => writeln!(stdout, "{name}: {s}"),
						other => writeln!(stdout, "{name}: {other}"),
					};
				}
			}
			Ok(other) => {
				let _ = writeln!(stdout, "{other}");
			}
			Err(_) => {}
		}
	} else if let Some(ref error) = result.error {
		let _ = writeln!(stdout, "Error [{}]: {}", error.code, error.message);
	}
}

pub fn print_error_stderr(error: &CommandError) {
	eprintln!("Error [{}]: {}", error.code, error.message);
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn success_envelope_omits_error() {
		let result = CommandResult::success("totp", serde_json::json!({ "code": "287082" }));
		let json = serde_json::to_value(&result).unwrap();
		assert_eq!(json["ok"], true);
		assert_eq!(json["data"]["code"], "287082");
		assert!(json.get("error").is_none());
	}

	#[test]
	fn failure_envelope_carries_code() {
		let result: CommandResult<()> = CommandResult::failure(
			"session.show",
			CommandError {
				code: ErrorCode::CorruptArtifact,
				message: "bad".into(),
			},
		);
		let json = serde_json::to_value(&result).unwrap();
		assert_eq!(json["ok"], false);
		assert_eq!(json["error"]["code"], "CORRUPT_ARTIFACT");
		assert!(json.get("data").is_none());
	}
}
