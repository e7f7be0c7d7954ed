use crate::{
	config::ImageSpec,
	docker::{self, Docker},
};

pub fn handle(spec: &ImageSpec) -> Result<(), docker::Error> {
	Docker::build(spec)?;
	println!("Image built as {}", spec.image_name());

	Ok(())
}
