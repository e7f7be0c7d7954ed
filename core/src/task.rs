use serde::Serialize;

/// Marker present in the rewritten argv of every Airflow task process.
const RUN_MARKER: &str = "airflow run";

/// Airflow tasks run under the system python; everything else is noise.
const PYTHON_PREFIX: &str = "/usr/bin/python";

/// An Airflow task run, identified from a process command line.
///
/// The scheduler rewrites the argv of task processes into a single
/// space-separated string (`/usr/bin/python .../airflow run <dag> <task>
/// <exec_date> ...`), so both the python check and the `airflow run` marker
/// look at whole argv elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AirflowTask {
	pub dag: String,
	pub operator: String,
	pub exec_date: String,
	pub is_local: bool,
	pub is_raw: bool,
}

impl AirflowTask {
	/// Identify an Airflow task from a process argv. Returns `None` for
	/// anything that isn't one, including malformed candidates.
	#[must_use]
	pub fn from_cmdline(cmdline: &[String]) -> Option<Self> {
		if !cmdline.first()?.starts_with(PYTHON_PREFIX) {
			return None;
		}

		cmdline
			.iter()
			.filter(|arg| arg.contains(RUN_MARKER))
			.find_map(|arg| Self::from_run_arg(arg))
	}

	fn from_run_arg(arg: &str) -> Option<Self> {
		let tokens: Vec<&str> = arg.split_whitespace().collect();

		let dag = (*tokens.get(3)?).to_string();
		let operator = (*tokens.get(4)?).to_string();
		// The execution date token carries a 5-char prefix; the date itself
		// is the next 20 chars, second precision.
		let exec_date: String = tokens.get(5)?.chars().skip(5).take(20).collect();

		Some(Self {
			dag,
			operator,
			exec_date,
			is_local: tokens.iter().any(|token| *token == "--local"),
			is_raw: tokens.iter().any(|token| *token == "--raw"),
		})
	}

	/// Label value identifying this task run in the exposition. The dag name
	/// is dropped when the operator already carries it.
	#[must_use]
	pub fn series_name(&self) -> String {
		let mut parts = if self.operator.contains(&self.dag) {
			vec![self.operator.clone()]
		} else {
			vec![format!("{}.{}", self.dag, self.operator)]
		};

		parts.push(self.exec_date.clone());

		if self.is_local {
			parts.push("local".to_string());
		}

		if self.is_raw {
			parts.push("is_raw".to_string());
		}

		parts.join("_")
	}
}
