use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::output::OutputFormat;
use crate::styles::cli_styles;

#[derive(Parser, Debug)]
#[command(name = "grid-e2e")]
#[command(about = "Inspect and manage persisted GRiD login sessions")]
#[command(version)]
#[command(styles = cli_styles())]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Output format: json (default) or text
	#[arg(short = 'f', long, global = true, value_enum, default_value = "json")]
	pub format: OutputFormat,

	/// GRiD instance to target (overrides GRID)
	#[arg(long, global = true, value_name = "NAME")]
	pub grid: Option<String>,

	/// Directory holding session artifacts (overrides GRID_AUTH_DIR)
	#[arg(long, global = true, value_name = "DIR")]
	pub auth_dir: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Persisted session artifacts
	#[command(subcommand)]
	Session(SessionCommand),

	/// Print the current one-time password for a base32 seed
	Totp(TotpArgs),
}

#[derive(Subcommand, Debug)]
pub enum SessionCommand {
	/// Show the cache key and artifact path a worker would use
	Key {
		/// Worker index
		#[arg(short, long, default_value_t = 0)]
		worker: usize,
	},

	/// List stored artifacts
	#[command(alias = "ls")]
	List,

	/// Summarize a stored artifact (cookie names, domains, expiry)
	Show {
		/// Cache key (defaults to the configured instance)
		#[arg(value_name = "KEY")]
		key: Option<String>,
	},

	/// Delete stored artifacts so the next run logs in again
	#[command(alias = "rm")]
	Clear {
		/// Cache key (defaults to the configured instance)
		#[arg(value_name = "KEY", conflicts_with = "all")]
		key: Option<String>,

		/// Delete every artifact in the auth directory
		#[arg(long)]
		all: bool,
	},
}

#[derive(Args, Debug)]
pub struct TotpArgs {
	/// Base32 seed
	#[arg(long, env = "GRID_OTP_SECRET", hide_env_values = true, value_name = "SEED")]
	pub secret: String,

	/// Unix time to compute the code for instead of now
	#[arg(long, value_name = "SECONDS")]
	pub at: Option<u64>,
}
