use super::{build, push};
use crate::{config::ImageSpec, docker};

// Build first, push second; a failed build never pushes.
pub fn handle(spec: &ImageSpec) -> Result<(), docker::Error> {
	build::handle(spec)?;
	push::handle(spec)
}
