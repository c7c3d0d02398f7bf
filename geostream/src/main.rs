mod tools;

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{ErrorLevel, Verbosity};
use std::io::{Write, stdout};

#[derive(Parser, Debug)]
#[command(
	author,
	version,
	about,
	long_about = None,
	propagate_version = true,
	disable_help_subcommand = true,
)]
struct Cli {
	#[command(subcommand)]
	command: Commands,

	#[command(flatten)]
	verbose: Verbosity<ErrorLevel>,
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Show header, bounds and index of a dataset
	Info(tools::info::Subcommand),

	/// Print the features inside one or more bounding boxes
	Query(tools::query::Subcommand),

	/// Walk all features in file order
	Scan(tools::scan::Subcommand),

	/// Fetch the features of some boxes and report the cache statistics
	Stats(tools::stats::Subcommand),
}

fn main() -> Result<()> {
	let cli = Cli::parse();

	env_logger::Builder::new()
		.filter_level(cli.verbose.log_level_filter())
		.format_timestamp(None)
		.init();

	let mut out = stdout().lock();
	run(cli, &mut out)?;
	out.flush()?;
	Ok(())
}

fn run(cli: Cli, out: &mut impl Write) -> Result<()> {
	match &cli.command {
		Commands::Info(arguments) => tools::info::run(arguments, out),
		Commands::Query(arguments) => tools::query::run(arguments, out),
		Commands::Scan(arguments) => tools::scan::run(arguments, out),
		Commands::Stats(arguments) => tools::stats::run(arguments, out),
	}
}
