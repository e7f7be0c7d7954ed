mod all;
mod build;
mod push;
mod run;

use clap::Subcommand;

use crate::{config::ImageSpec, docker};

#[derive(Debug, Subcommand)]
pub enum Command {
	/// Build the image from <BASE>.Dockerfile
	Build,

	/// Push the image to the Docker registry
	Push,

	/// Build the image, then push it
	All,

	/// Run the image with access to the host's procfs
	Run {
		/// Publish the metrics port (HOST:CONTAINER)
		#[clap(long)]
		publish: Option<String>,
	},
}

pub fn exec(spec: &ImageSpec, command: Command) -> Result<(), docker::Error> {
	match command {
		Command::Build => build::handle(spec),
		Command::Push => push::handle(spec),
		Command::All => all::handle(spec),
		Command::Run { publish } => run::handle(spec, publish),
	}
}
