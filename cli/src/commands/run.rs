use crate::{
	config::ImageSpec,
	docker::{self, Docker, RunOptions},
};

pub fn handle(spec: &ImageSpec, publish: Option<String>) -> Result<(), docker::Error> {
	Docker::run(spec, &RunOptions { publish })
}
