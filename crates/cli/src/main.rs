use clap::Parser;
use grid_cli::cli::Cli;
use grid_cli::output::{self, CommandResult, OutputFormat};
use grid_cli::{commands, logging};

fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	let format = cli.format;
	let (command, result) = commands::dispatch(&cli);

	match result {
		Ok(data) => output::print_result(&CommandResult::success(command, data), format),
		Err(err) => {
			let cmd_error = err.to_command_error();
			output::print_error_stderr(&cmd_error);
			if format != OutputFormat::Text {
				let result: CommandResult<()> = CommandResult::failure(command, cmd_error);
				output::print_result(&result, format);
			}
			std::process::exit(1);
		}
	}
}
