use std::{
	collections::HashMap,
	sync::{
		atomic::{AtomicUsize, Ordering},
		Mutex, PoisonError,
	},
	time::Instant,
};

use airflow_stats_core::{AirflowTask, ProcessStats};
use prometheus::{
	Encoder, GaugeVec, Histogram, HistogramOpts, IntGaugeVec, Opts, Registry, TextEncoder,
};

use crate::{
	config::Config,
	procfs::{self, ProcDir, Process},
};

/// Labels identifying a task run; constant labels from the config come on
/// top via the registry.
const LABELS: &[&str] = &["name", "dag", "operator", "exec_date"];

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("failed to list processes: {0}")]
	Scan(#[from] std::io::Error),

	#[error(transparent)]
	Registry(#[from] prometheus::Error),

	#[error("exposition is not valid UTF-8: {0}")]
	Encoding(#[from] std::string::FromUtf8Error),
}

struct CpuSnapshot {
	ticks: u64,
	at: Instant,
}

/// Scans a procfs tree for Airflow task processes and mirrors their stats
/// into a Prometheus registry. One full scan per scrape.
pub struct Collector {
	proc: ProcDir,
	registry: Registry,
	page_size: u64,
	ticks_per_second: u64,
	cpu_seen: Mutex<HashMap<i32, CpuSnapshot>>,
	last_seen: AtomicUsize,

	mem_rss: IntGaugeVec,
	mem_vms: IntGaugeVec,
	mem_shared: IntGaugeVec,
	mem_text: IntGaugeVec,
	mem_lib: IntGaugeVec,
	mem_data: IntGaugeVec,
	mem_uss: IntGaugeVec,
	mem_pss: IntGaugeVec,
	mem_swap: IntGaugeVec,
	cpu_percent: GaugeVec,
	cpu_times_user: GaugeVec,
	cpu_times_system: GaugeVec,
	collect_time: Histogram,
}

impl Collector {
	/// Build the registry and register every metric family.
	///
	/// # Errors
	///
	/// This function will return an error if the configured prefix or labels
	/// are not valid metric names.
	pub fn new(config: &Config) -> Result<Self, prometheus::Error> {
		let labels = (!config.labels.is_empty()).then(|| config.labels.clone());
		let registry = Registry::new_custom(config.prefix.clone(), labels)?;

		let collect_time = Histogram::with_opts(HistogramOpts::new(
			"airflow_collecting_stats_seconds",
			"Time spent collecting process stats",
		))?;
		registry.register(Box::new(collect_time.clone()))?;

		Ok(Self {
			proc: ProcDir::new(&config.procfs_path),
			page_size: procfs::page_size(),
			ticks_per_second: procfs::ticks_per_second(),
			cpu_seen: Mutex::new(HashMap::new()),
			last_seen: AtomicUsize::new(0),
			mem_rss: int_gauge(&registry, "airflow_process_mem_rss", "Non-swapped physical memory")?,
			mem_vms: int_gauge(&registry, "airflow_process_mem_vms", "Amount of virtual memory")?,
			mem_shared: int_gauge(&registry, "airflow_process_mem_shared", "Amount of shared memory")?,
			mem_text: int_gauge(&registry, "airflow_process_mem_text", "Devoted to executable code")?,
			mem_lib: int_gauge(&registry, "airflow_process_mem_lib", "Used by shared libraries")?,
			mem_data: int_gauge(&registry, "airflow_process_mem_data", "Devoted to data and stack")?,
			mem_uss: int_gauge(
				&registry,
				"airflow_process_mem_uss",
				"Mem unique to a process and which would be freed if the process was terminated right now",
			)?,
			mem_pss: int_gauge(
				&registry,
				"airflow_process_mem_pss",
				"Shared with other processes, accounted in a way that the amount is divided evenly between processes that share it",
			)?,
			mem_swap: int_gauge(&registry, "airflow_process_mem_swap", "Amount of swapped memory")?,
			cpu_percent: gauge(
				&registry,
				"airflow_process_cpu_percent",
				"System-wide CPU utilization as a percentage of the process",
			)?,
			cpu_times_user: gauge(&registry, "airflow_process_cpu_times_user", "CPU times user")?,
			cpu_times_system: gauge(
				&registry,
				"airflow_process_cpu_times_system",
				"CPU times system",
			)?,
			collect_time,
			registry,
		})
	}

	/// Scan the procfs tree and refresh every gauge. Returns the number of
	/// Airflow task processes seen.
	///
	/// # Errors
	///
	/// This function will return an error if the procfs root cannot be
	/// listed. Individual processes vanishing mid-scan are skipped.
	pub fn collect(&self) -> Result<usize, Error> {
		let timer = self.collect_time.start_timer();
		self.reset();

		let mut seen = HashMap::new();
		let mut handled = 0;

		for process in self.proc.processes()? {
			let Some((task, stats)) = self.sample(&process, &mut seen) else {
				continue;
			};

			self.record(&task, &stats);
			handled += 1;
		}

		*self
			.cpu_seen
			.lock()
			.unwrap_or_else(PoisonError::into_inner) = seen;
		self.last_seen.store(handled, Ordering::Relaxed);
		timer.observe_duration();

		tracing::info!("Gathered metrics from {handled} processes");
		Ok(handled)
	}

	/// Render the current registry contents in the text exposition format.
	///
	/// # Errors
	///
	/// This function will return an error if encoding fails.
	pub fn encode(&self) -> Result<String, Error> {
		let mut buffer = Vec::new();
		TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;

		Ok(String::from_utf8(buffer)?)
	}

	/// Number of task processes matched by the most recent scan.
	#[must_use]
	pub fn last_seen(&self) -> usize {
		self.last_seen.load(Ordering::Relaxed)
	}

	#[allow(clippy::cast_precision_loss)]
	fn sample(
		&self,
		process: &Process,
		seen: &mut HashMap<i32, CpuSnapshot>,
	) -> Option<(AirflowTask, ProcessStats)> {
		// Any of these reads can hit a process that exited mid-scan.
		let cmdline = process.cmdline().ok()?;
		let task = AirflowTask::from_cmdline(&cmdline)?;
		let stat = process.stat().ok()?;
		let statm = process.statm().ok()?;
		let rollup = process.smaps_rollup().ok()?;

		let now = Instant::now();
		let total_ticks = stat.utime + stat.stime;
		let cpu_percent = self.cpu_percent_for(process.pid(), total_ticks, now);
		seen.insert(
			process.pid(),
			CpuSnapshot {
				ticks: total_ticks,
				at: now,
			},
		);

		let ticks = self.ticks_per_second as f64;
		let stats = ProcessStats {
			mem_rss: statm.resident * self.page_size,
			mem_vms: statm.size * self.page_size,
			mem_shared: statm.shared * self.page_size,
			mem_text: statm.text * self.page_size,
			mem_lib: statm.lib * self.page_size,
			mem_data: statm.data * self.page_size,
			mem_uss: rollup.uss(),
			mem_pss: rollup.pss,
			mem_swap: rollup.swap,
			cpu_percent,
			cpu_times_user: stat.utime as f64 / ticks,
			cpu_times_system: stat.stime as f64 / ticks,
		};

		Some((task, stats))
	}

	// Percentage of one CPU used since the previous scan of this pid. A
	// first sighting has no baseline and reports 0.
	#[allow(clippy::cast_precision_loss)]
	fn cpu_percent_for(&self, pid: i32, total_ticks: u64, now: Instant) -> f64 {
		let state = self.cpu_seen.lock().unwrap_or_else(PoisonError::into_inner);

		let Some(previous) = state.get(&pid) else {
			return 0.0;
		};

		let elapsed = now.duration_since(previous.at).as_secs_f64();
		if elapsed <= 0.0 {
			return 0.0;
		}

		let used =
			total_ticks.saturating_sub(previous.ticks) as f64 / self.ticks_per_second as f64;

		used / elapsed * 100.0
	}

	#[allow(clippy::cast_possible_wrap)]
	fn record(&self, task: &AirflowTask, stats: &ProcessStats) {
		let name = task.series_name();
		let labels = [
			name.as_str(),
			task.dag.as_str(),
			task.operator.as_str(),
			task.exec_date.as_str(),
		];

		self.mem_rss.with_label_values(&labels).set(stats.mem_rss as i64);
		self.mem_vms.with_label_values(&labels).set(stats.mem_vms as i64);
		self.mem_shared.with_label_values(&labels).set(stats.mem_shared as i64);
		self.mem_text.with_label_values(&labels).set(stats.mem_text as i64);
		self.mem_lib.with_label_values(&labels).set(stats.mem_lib as i64);
		self.mem_data.with_label_values(&labels).set(stats.mem_data as i64);
		self.mem_uss.with_label_values(&labels).set(stats.mem_uss as i64);
		self.mem_pss.with_label_values(&labels).set(stats.mem_pss as i64);
		self.mem_swap.with_label_values(&labels).set(stats.mem_swap as i64);

		self.cpu_percent
			.with_label_values(&labels)
			.set(stats.cpu_percent);
		self.cpu_times_user
			.with_label_values(&labels)
			.set(stats.cpu_times_user);
		self.cpu_times_system
			.with_label_values(&labels)
			.set(stats.cpu_times_system);
	}

	// Series for processes that exited must disappear from the exposition.
	fn reset(&self) {
		self.mem_rss.reset();
		self.mem_vms.reset();
		self.mem_shared.reset();
		self.mem_text.reset();
		self.mem_lib.reset();
		self.mem_data.reset();
		self.mem_uss.reset();
		self.mem_pss.reset();
		self.mem_swap.reset();
		self.cpu_percent.reset();
		self.cpu_times_user.reset();
		self.cpu_times_system.reset();
	}
}

fn int_gauge(
	registry: &Registry,
	name: &str,
	help: &str,
) -> Result<IntGaugeVec, prometheus::Error> {
	let gauge = IntGaugeVec::new(Opts::new(name, help), LABELS)?;
	registry.register(Box::new(gauge.clone()))?;

	Ok(gauge)
}

fn gauge(registry: &Registry, name: &str, help: &str) -> Result<GaugeVec, prometheus::Error> {
	let gauge = GaugeVec::new(Opts::new(name, help), LABELS)?;
	registry.register(Box::new(gauge.clone()))?;

	Ok(gauge)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::{collections::HashMap, fs, path::Path};

	const TASK_ARGV: &str = "/usr/bin/python /usr/local/bin/airflow run tutorial sleep date=2019-06-11T14:00:00 --local";

	fn write_process(root: &Path, pid: u32, cmdline: &str, utime: u64, statm: &str) {
		let dir = root.join(pid.to_string());
		fs::create_dir(&dir).unwrap();

		// Task processes rewrite their argv into a single string.
		fs::write(dir.join("cmdline"), cmdline).unwrap();
		fs::write(
			dir.join("stat"),
			format!("{pid} (python) S 1 {pid} {pid} 0 -1 4194304 120 0 0 0 {utime} 8 0 0 20 0 1 0 3000 0 0"),
		)
		.unwrap();
		fs::write(dir.join("statm"), statm).unwrap();
		fs::write(
			dir.join("smaps_rollup"),
			"Pss: 6400 kB\nPrivate_Clean: 1200 kB\nPrivate_Dirty: 4000 kB\nSwap: 128 kB\n",
		)
		.unwrap();
	}

	fn config(root: &Path) -> Config {
		Config {
			procfs_path: root.to_path_buf(),
			..Config::default()
		}
	}

	#[test]
	fn collects_only_airflow_task_processes() {
		let root = tempfile::tempdir().unwrap();
		write_process(root.path(), 100, TASK_ARGV, 52, "2500 600 200 100 0 700 0");
		write_process(root.path(), 101, "/usr/bin/dockerd --debug", 1, "1 1 1 1 1 1 1");

		let collector = Collector::new(&config(root.path())).unwrap();

		assert_eq!(collector.collect().unwrap(), 1);
		assert_eq!(collector.last_seen(), 1);

		let exposition = collector.encode().unwrap();
		assert!(exposition.contains("airflow_process_mem_rss"));
		assert!(exposition.contains("dag=\"tutorial\""));
		assert!(exposition.contains("operator=\"sleep\""));
		assert!(!exposition.contains("dockerd"));
	}

	#[test]
	fn memory_gauges_convert_pages_to_bytes() {
		let root = tempfile::tempdir().unwrap();
		write_process(root.path(), 100, TASK_ARGV, 52, "2500 600 200 100 0 700 0");

		let collector = Collector::new(&config(root.path())).unwrap();
		collector.collect().unwrap();

		let rss = 600 * procfs::page_size();
		let exposition = collector.encode().unwrap();
		assert!(exposition.contains("airflow_process_mem_rss{dag=\"tutorial\""));
		assert!(exposition.contains(&format!(" {rss}\n")));
	}

	#[test]
	fn first_scan_reports_zero_cpu_percent() {
		let root = tempfile::tempdir().unwrap();
		write_process(root.path(), 100, TASK_ARGV, 52, "1 1 1 1 1 1 1");

		let collector = Collector::new(&config(root.path())).unwrap();
		collector.collect().unwrap();

		let exposition = collector.encode().unwrap();
		assert!(exposition.contains("airflow_process_cpu_percent"));

		for line in exposition.lines() {
			if line.starts_with("airflow_process_cpu_percent{") {
				assert!(line.ends_with(" 0"));
			}
		}
	}

	#[test]
	fn cpu_percent_uses_tick_delta_between_scans() {
		let root = tempfile::tempdir().unwrap();
		write_process(root.path(), 100, TASK_ARGV, 50, "1 1 1 1 1 1 1");

		let collector = Collector::new(&config(root.path())).unwrap();
		collector.collect().unwrap();

		std::thread::sleep(std::time::Duration::from_millis(5));
		let now = Instant::now();
		let percent = collector.cpu_percent_for(100, 50 + collector.ticks_per_second, now);

		// One full second of CPU over (nearly) no wall time: a busy process.
		assert!(percent > 100.0);
		assert!(collector.cpu_percent_for(999, 10, now).abs() < f64::EPSILON);
	}

	#[test]
	fn exited_processes_drop_out_of_the_exposition() {
		let root = tempfile::tempdir().unwrap();
		write_process(root.path(), 100, TASK_ARGV, 52, "1 1 1 1 1 1 1");

		let collector = Collector::new(&config(root.path())).unwrap();
		collector.collect().unwrap();
		assert!(collector.encode().unwrap().contains("dag=\"tutorial\""));

		fs::remove_dir_all(root.path().join("100")).unwrap();
		assert_eq!(collector.collect().unwrap(), 0);
		assert!(!collector.encode().unwrap().contains("dag=\"tutorial\""));
	}

	#[test]
	fn prefix_and_global_labels_apply_to_every_series() {
		let root = tempfile::tempdir().unwrap();
		write_process(root.path(), 100, TASK_ARGV, 52, "1 1 1 1 1 1 1");

		let config = Config {
			procfs_path: root.path().to_path_buf(),
			prefix: Some("staging".to_string()),
			labels: HashMap::from([("env".to_string(), "prod".to_string())]),
			..Config::default()
		};

		let collector = Collector::new(&config).unwrap();
		collector.collect().unwrap();

		let exposition = collector.encode().unwrap();
		assert!(exposition.contains("staging_airflow_process_mem_rss"));
		assert!(exposition.contains("env=\"prod\""));
	}

	#[test]
	fn collection_time_histogram_is_exported() {
		let root = tempfile::tempdir().unwrap();

		let collector = Collector::new(&config(root.path())).unwrap();
		collector.collect().unwrap();

		assert!(collector
			.encode()
			.unwrap()
			.contains("airflow_collecting_stats_seconds_count 1"));
	}
}
