use thiserror::Error;

use crate::output::{CommandError, ErrorCode};

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
	#[error(transparent)]
	Grid(#[from] grid::Error),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),
}

impl CliError {
	pub fn to_command_error(&self) -> CommandError {
		let code = match self {
			CliError::Grid(err) => match err {
				grid::Error::StaleOrCorruptArtifact { .. } => ErrorCode::CorruptArtifact,
				grid::Error::MissingCredential { .. } => ErrorCode::MissingCredential,
				grid::Error::Io(_) => ErrorCode::IoError,
				e if e.is_setup_error() => ErrorCode::InvalidInput,
				_ => ErrorCode::InternalError,
			},
			CliError::Io(_) => ErrorCode::IoError,
			CliError::Json(_) => ErrorCode::InternalError,
		};
		CommandError {
			code,
			message: self.to_string(),
		}
	}
}
