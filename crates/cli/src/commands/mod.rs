//! Command dispatch.

pub mod session;
pub mod totp;

use grid::RunConfig;
use serde_json::Value;

use crate::cli::{Cli, Commands, SessionCommand};
use crate::error::Result;

/// Runs the parsed command and returns its name and result data.
pub fn dispatch(cli: &Cli) -> (&'static str, Result<Value>) {
	let name = command_name(&cli.command);
	let result = match &cli.command {
		Commands::Session(command) => load_config(cli).and_then(|config| session::run(&config, command)),
		Commands::Totp(args) => totp::run(args),
	};
	(name, result)
}

pub fn command_name(command: &Commands) -> &'static str {
	match command {
		Commands::Session(SessionCommand::Key { .. }) => "session.key",
		Commands::Session(SessionCommand::List) => "session.list",
		Commands::Session(SessionCommand::Show { .. }) => "session.show",
		Commands::Session(SessionCommand::Clear { .. }) => "session.clear",
		Commands::Totp(_) => "totp",
	}
}

/// Environment configuration with command-line overrides applied.
fn load_config(cli: &Cli) -> Result<RunConfig> {
	let mut config = RunConfig::from_env()?;
	if let Some(grid) = &cli.grid {
		config = config.with_grid(grid.trim());
	}
	if let Some(dir) = &cli.auth_dir {
		config = config.with_auth_dir(dir.clone());
	}
	Ok(config)
}
