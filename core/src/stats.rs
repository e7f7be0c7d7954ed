use serde::Serialize;

/// One sample of a matched Airflow task process. Memory is in bytes, CPU
/// times in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ProcessStats {
	pub mem_rss: u64,
	pub mem_vms: u64,
	pub mem_shared: u64,
	pub mem_text: u64,
	pub mem_lib: u64,
	pub mem_data: u64,
	pub mem_uss: u64,
	pub mem_pss: u64,
	pub mem_swap: u64,

	pub cpu_percent: f64,
	pub cpu_times_user: f64,
	pub cpu_times_system: f64,
}
