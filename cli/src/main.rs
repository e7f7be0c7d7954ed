#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use clap::Parser;

use crate::docker::Docker;

mod commands;
mod config;
mod docker;

/// Build, push and run the airflow_operator_stats Docker image
#[derive(Debug, Parser)]
#[clap(name = "airflow-stats", version)]
struct Cli {
	#[clap(flatten)]
	image: config::ImageArgs,

	#[clap(subcommand)]
	command: commands::Command,
}

fn main() {
	let cli = Cli::parse();

	if let Err(error) = Docker::check_connection() {
		eprintln!("{error}");
		std::process::exit(1);
	}

	let spec = cli.image.resolve();

	if let Err(error) = commands::exec(&spec, cli.command) {
		eprintln!("{error}");
		std::process::exit(error.exit_code());
	}
}
