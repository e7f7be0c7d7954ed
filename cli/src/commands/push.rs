use crate::{
	config::ImageSpec,
	docker::{self, Docker},
};

pub fn handle(spec: &ImageSpec) -> Result<(), docker::Error> {
	Docker::push(spec)?;
	println!("Image '{}' pushed", spec.image_name());

	Ok(())
}
