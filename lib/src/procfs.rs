use std::{
	fs, io,
	path::PathBuf,
};

/// Errors that can occur when reading a procfs tree.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// The process exited between enumeration and the read. Normal churn,
	/// callers skip these.
	#[error("process is gone")]
	Vanished,

	#[error("failed to read {0}: {1}")]
	Io(&'static str, io::Error),

	#[error("malformed {0} content")]
	Malformed(&'static str),
}

/// A procfs tree, usually `/proc`. The run target bind-mounts the host's
/// procfs at `/host-proc`, so the root is configurable.
#[derive(Debug, Clone)]
pub struct ProcDir {
	root: PathBuf,
}

impl ProcDir {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	/// Enumerate the processes currently present (numeric entries).
	///
	/// # Errors
	///
	/// Returns an error if the root directory cannot be listed.
	pub fn processes(&self) -> io::Result<Vec<Process>> {
		let mut processes = Vec::new();

		for entry in fs::read_dir(&self.root)? {
			let entry = entry?;
			let Ok(pid) = entry.file_name().to_string_lossy().parse::<i32>() else {
				continue;
			};

			processes.push(Process {
				pid,
				dir: entry.path(),
			});
		}

		processes.sort_unstable_by_key(|process| process.pid);
		Ok(processes)
	}
}

/// A single `/proc/<pid>` directory.
#[derive(Debug, Clone)]
pub struct Process {
	pid: i32,
	dir: PathBuf,
}

impl Process {
	#[must_use]
	pub const fn pid(&self) -> i32 {
		self.pid
	}

	fn read(&self, name: &'static str) -> Result<String, Error> {
		match fs::read_to_string(self.dir.join(name)) {
			Ok(content) => Ok(content),
			Err(err)
				if err.kind() == io::ErrorKind::NotFound
					|| err.raw_os_error() == Some(libc::ESRCH) =>
			{
				Err(Error::Vanished)
			},
			Err(err) => Err(Error::Io(name, err)),
		}
	}

	/// The process's argv. Kernel threads read as empty.
	///
	/// # Errors
	///
	/// Returns an error if the process vanished or `cmdline` is unreadable.
	pub fn cmdline(&self) -> Result<Vec<String>, Error> {
		Ok(self
			.read("cmdline")?
			.split('\0')
			.filter(|part| !part.is_empty())
			.map(ToString::to_string)
			.collect())
	}

	/// Scheduler fields from `stat`.
	///
	/// # Errors
	///
	/// Returns an error if the process vanished or `stat` cannot be parsed.
	pub fn stat(&self) -> Result<Stat, Error> {
		Stat::parse(&self.read("stat")?)
	}

	/// Page-denominated memory sizes from `statm`.
	///
	/// # Errors
	///
	/// Returns an error if the process vanished or `statm` cannot be parsed.
	pub fn statm(&self) -> Result<Statm, Error> {
		Statm::parse(&self.read("statm")?)
	}

	/// Accumulated mapping totals from `smaps_rollup`. The file needs
	/// ptrace access and a 4.14+ kernel; when unreadable the totals degrade
	/// to zeros rather than dropping the whole sample.
	///
	/// # Errors
	///
	/// Returns an error if the process vanished.
	pub fn smaps_rollup(&self) -> Result<SmapsRollup, Error> {
		match self.read("smaps_rollup") {
			Ok(content) => SmapsRollup::parse(&content),
			Err(Error::Vanished) if !self.dir.exists() => Err(Error::Vanished),
			Err(_) => Ok(SmapsRollup::default()),
		}
	}
}

/// CPU fields from `/proc/<pid>/stat`, in clock ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stat {
	pub utime: u64,
	pub stime: u64,
}

impl Stat {
	fn parse(content: &str) -> Result<Self, Error> {
		// comm is parenthesised and may itself contain spaces or parens, so
		// fields are only space-separated after the *last* ')'. The first
		// field after it is state; utime and stime land at offsets 11/12.
		let rest = content.rsplit_once(')').ok_or(Error::Malformed("stat"))?.1;
		let fields: Vec<&str> = rest.split_whitespace().collect();

		let field = |index: usize| -> Result<u64, Error> {
			fields
				.get(index)
				.and_then(|field| field.parse().ok())
				.ok_or(Error::Malformed("stat"))
		};

		Ok(Self {
			utime: field(11)?,
			stime: field(12)?,
		})
	}
}

/// Memory sizes from `/proc/<pid>/statm`, in pages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statm {
	pub size: u64,
	pub resident: u64,
	pub shared: u64,
	pub text: u64,
	pub lib: u64,
	pub data: u64,
}

impl Statm {
	fn parse(content: &str) -> Result<Self, Error> {
		let fields: Vec<u64> = content
			.split_whitespace()
			.map(str::parse)
			.collect::<Result<_, _>>()
			.map_err(|_| Error::Malformed("statm"))?;

		if fields.len() < 7 {
			return Err(Error::Malformed("statm"));
		}

		Ok(Self {
			size: fields[0],
			resident: fields[1],
			shared: fields[2],
			text: fields[3],
			lib: fields[4],
			data: fields[5],
		})
	}
}

/// Mapping totals from `/proc/<pid>/smaps_rollup`, converted to bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SmapsRollup {
	pub pss: u64,
	pub swap: u64,
	pub private_clean: u64,
	pub private_dirty: u64,
}

impl SmapsRollup {
	/// Memory unique to the process, freed if it exited right now.
	#[must_use]
	pub const fn uss(&self) -> u64 {
		self.private_clean + self.private_dirty
	}

	fn parse(content: &str) -> Result<Self, Error> {
		let mut rollup = Self::default();

		for line in content.lines() {
			let Some((key, rest)) = line.split_once(':') else {
				continue;
			};

			let target = match key.trim() {
				"Pss" => &mut rollup.pss,
				"Swap" => &mut rollup.swap,
				"Private_Clean" => &mut rollup.private_clean,
				"Private_Dirty" => &mut rollup.private_dirty,
				_ => continue,
			};

			let kilobytes: u64 = rest
				.trim()
				.trim_end_matches("kB")
				.trim()
				.parse()
				.map_err(|_| Error::Malformed("smaps_rollup"))?;

			*target = kilobytes * 1024;
		}

		Ok(rollup)
	}
}

/// Bytes per page, for `statm` conversions.
#[must_use]
pub fn page_size() -> u64 {
	// SAFETY: sysconf has no memory-safety preconditions.
	let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
	u64::try_from(size).unwrap_or(4096)
}

/// Clock ticks per second, for `stat` CPU time conversions.
#[must_use]
pub fn ticks_per_second() -> u64 {
	// SAFETY: sysconf has no memory-safety preconditions.
	let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
	u64::try_from(ticks).unwrap_or(100)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::path::Path;

	fn write_process(
		root: &Path,
		pid: u32,
		cmdline: &[&str],
		utime: u64,
		stime: u64,
		statm: &str,
	) {
		let dir = root.join(pid.to_string());
		fs::create_dir(&dir).unwrap();

		fs::write(dir.join("cmdline"), cmdline.join("\0")).unwrap();
		fs::write(
			dir.join("stat"),
			format!("{pid} (some (proc)) S 1 {pid} {pid} 0 -1 4194304 120 0 0 0 {utime} {stime} 0 0 20 0 1 0 3000 0 0"),
		)
		.unwrap();
		fs::write(dir.join("statm"), statm).unwrap();
		fs::write(
			dir.join("smaps_rollup"),
			"55e8d0b9c000-7ffc8bbb3000 ---p 00000000 00:00 0    [rollup]\n\
			 Rss:                9200 kB\n\
			 Pss:                6400 kB\n\
			 Private_Clean:      1200 kB\n\
			 Private_Dirty:      4000 kB\n\
			 Referenced:         9200 kB\n\
			 Swap:                128 kB\n",
		)
		.unwrap();
	}

	#[test]
	fn enumerates_only_numeric_entries() {
		let root = tempfile::tempdir().unwrap();
		write_process(root.path(), 42, &["/usr/bin/python"], 1, 1, "100 50 10 5 0 40 0");
		fs::create_dir(root.path().join("sys")).unwrap();
		fs::write(root.path().join("uptime"), "100.0 50.0").unwrap();

		let processes = ProcDir::new(root.path()).processes().unwrap();

		assert_eq!(processes.len(), 1);
		assert_eq!(processes[0].pid(), 42);
	}

	#[test]
	fn cmdline_splits_on_nul() {
		let root = tempfile::tempdir().unwrap();
		write_process(root.path(), 7, &["/usr/bin/python", "-m", "airflow"], 0, 0, "1 1 1 1 1 1 1");

		let processes = ProcDir::new(root.path()).processes().unwrap();

		assert_eq!(
			processes[0].cmdline().unwrap(),
			["/usr/bin/python", "-m", "airflow"]
		);
	}

	#[test]
	fn stat_parses_past_parenthesised_comm() {
		let root = tempfile::tempdir().unwrap();
		write_process(root.path(), 7, &["x"], 52, 8, "1 1 1 1 1 1 1");

		let stat = ProcDir::new(root.path()).processes().unwrap()[0]
			.stat()
			.unwrap();

		assert_eq!(stat, Stat { utime: 52, stime: 8 });
	}

	#[test]
	fn statm_fields_are_positional() {
		let root = tempfile::tempdir().unwrap();
		write_process(root.path(), 7, &["x"], 0, 0, "2500 600 200 100 0 700 0");

		let statm = ProcDir::new(root.path()).processes().unwrap()[0]
			.statm()
			.unwrap();

		assert_eq!(
			statm,
			Statm {
				size: 2500,
				resident: 600,
				shared: 200,
				text: 100,
				lib: 0,
				data: 700,
			}
		);
	}

	#[test]
	fn smaps_rollup_converts_kilobytes() {
		let root = tempfile::tempdir().unwrap();
		write_process(root.path(), 7, &["x"], 0, 0, "1 1 1 1 1 1 1");

		let rollup = ProcDir::new(root.path()).processes().unwrap()[0]
			.smaps_rollup()
			.unwrap();

		assert_eq!(rollup.pss, 6400 * 1024);
		assert_eq!(rollup.swap, 128 * 1024);
		assert_eq!(rollup.uss(), (1200 + 4000) * 1024);
	}

	#[test]
	fn missing_smaps_rollup_degrades_to_zeros() {
		let root = tempfile::tempdir().unwrap();
		write_process(root.path(), 7, &["x"], 0, 0, "1 1 1 1 1 1 1");
		fs::remove_file(root.path().join("7/smaps_rollup")).unwrap();

		let rollup = ProcDir::new(root.path()).processes().unwrap()[0]
			.smaps_rollup()
			.unwrap();

		assert_eq!(rollup, SmapsRollup::default());
	}

	#[test]
	fn vanished_process_is_flagged() {
		let root = tempfile::tempdir().unwrap();
		write_process(root.path(), 7, &["x"], 0, 0, "1 1 1 1 1 1 1");

		let process = ProcDir::new(root.path()).processes().unwrap()[0].clone();
		fs::remove_dir_all(root.path().join("7")).unwrap();

		assert!(matches!(process.stat(), Err(Error::Vanished)));
	}
}
