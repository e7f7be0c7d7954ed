use airflow_stats_core::IMAGE_REPO;
use clap::Args;

/// Image selection, mirroring the BASE/TAG build variables.
#[derive(Debug, Args)]
pub struct ImageArgs {
	/// Base image variant to target (selects <BASE>.Dockerfile)
	#[clap(long, env = "BASE", default_value = "ubuntu", global = true)]
	base: String,

	/// Tag for the produced image; defaults to the base name
	#[clap(long, env = "TAG", global = true)]
	tag: Option<String>,
}

impl ImageArgs {
	pub fn resolve(self) -> ImageSpec {
		ImageSpec {
			base: self.base,
			tag: self.tag,
		}
	}
}

/// A resolved base/tag pair. Everything the docker invocations need is
/// derived from these two strings.
#[derive(Debug, Clone)]
pub struct ImageSpec {
	pub base: String,
	pub tag: Option<String>,
}

impl ImageSpec {
	/// The tag falls back to the base name when not set explicitly.
	#[must_use]
	pub fn tag(&self) -> &str {
		self.tag.as_deref().unwrap_or(&self.base)
	}

	#[must_use]
	pub fn image_name(&self) -> String {
		format!("{IMAGE_REPO}:{}", self.tag())
	}

	#[must_use]
	pub fn dockerfile(&self) -> String {
		format!("{}.Dockerfile", self.base)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn spec(base: &str, tag: Option<&str>) -> ImageSpec {
		ImageSpec {
			base: base.to_string(),
			tag: tag.map(ToString::to_string),
		}
	}

	#[test]
	fn tag_defaults_to_base() {
		assert_eq!(spec("ubuntu", None).tag(), "ubuntu");
		assert_eq!(spec("alpine", None).tag(), "alpine");
	}

	#[test]
	fn explicit_tag_is_used_literally() {
		assert_eq!(
			spec("ubuntu", Some("2019-06-11")).image_name(),
			"mastak/airflow_operator_stats:2019-06-11"
		);
	}

	#[test]
	fn dockerfile_follows_base() {
		assert_eq!(spec("alpine", Some("v2")).dockerfile(), "alpine.Dockerfile");
	}
}
