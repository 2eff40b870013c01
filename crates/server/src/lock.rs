//! Advisory backend locks.
//!
//! Every active backend holds a shared lock on `backend-<id>.lock`. Offline
//! tools that rewrite a backend's data (import, restore) take the exclusive
//! lock, so neither can run while the other holds its lock.
//!
//! [`FileLockManager`] backs the locks with `flock(2)` on files in a lock
//! directory and counts holders inside the process, since `flock` does not
//! distinguish between two shared acquisitions by the same process.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use rustix::fs::{FlockOperation, flock};
use thiserror::Error;
use tracing::debug;

/// Why a lock could not be acquired or released.
#[derive(Debug, Error)]
pub enum LockError {
	/// Another holder has the lock exclusively.
	#[error("lock {name} is held exclusively")]
	HeldExclusively { name: String },

	/// The lock has shared holders, so it cannot be taken exclusively.
	#[error("lock {name} is held by {holders} shared holder(s)")]
	HeldShared { name: String, holders: usize },

	/// Another process holds a conflicting lock on the file.
	#[error("lock {name} is held by another process")]
	Contended { name: String },

	/// Release of a lock this manager does not hold.
	#[error("lock {name} is not held")]
	NotHeld { name: String },

	/// The lock file could not be opened or locked.
	#[error("lock file {path}: {error}")]
	Io {
		path: PathBuf,
		error: std::io::Error,
	},
}

/// Advisory lock service keyed by lock file name.
pub trait LockManager: Send + Sync {
	/// Takes a shared lock; several shared holders may coexist.
	fn acquire_shared_lock(&self, name: &str) -> Result<(), LockError>;

	/// Takes an exclusive lock; fails while any other holder exists.
	fn acquire_exclusive_lock(&self, name: &str) -> Result<(), LockError>;

	/// Releases one hold of `name`.
	fn release_lock(&self, name: &str) -> Result<(), LockError>;
}

/// Name of the lock file guarding `backend_id`.
pub fn backend_lock_file_name(backend_id: &str) -> String {
	format!("backend-{backend_id}.lock")
}

enum Held {
	Shared { _file: File, holders: usize },
	Exclusive { _file: File },
}

/// [`LockManager`] backed by `flock` on files below one directory.
pub struct FileLockManager {
	dir: PathBuf,
	held: Mutex<FxHashMap<String, Held>>,
}

impl FileLockManager {
	/// Creates the lock directory if needed.
	pub fn new(dir: impl Into<PathBuf>) -> Result<Self, LockError> {
		let dir = dir.into();
		std::fs::create_dir_all(&dir).map_err(|error| LockError::Io {
			path: dir.clone(),
			error,
		})?;
		Ok(Self {
			dir,
			held: Mutex::new(FxHashMap::default()),
		})
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	fn lock_file(&self, name: &str, op: FlockOperation) -> Result<File, LockError> {
		let path = self.dir.join(name);
		let io_err = |error: std::io::Error| LockError::Io {
			path: path.clone(),
			error,
		};
		let file = OpenOptions::new()
			.read(true)
			.write(true)
			.create(true)
			.truncate(false)
			.open(&path)
			.map_err(io_err)?;
		flock(&file, op).map_err(|errno| {
			if errno == rustix::io::Errno::WOULDBLOCK {
				LockError::Contended {
					name: name.to_string(),
				}
			} else {
				io_err(errno.into())
			}
		})?;
		Ok(file)
	}
}

impl LockManager for FileLockManager {
	fn acquire_shared_lock(&self, name: &str) -> Result<(), LockError> {
		let mut held = self.held.lock();
		match held.get_mut(name) {
			Some(Held::Shared { holders, .. }) => {
				*holders += 1;
				return Ok(());
			}
			Some(Held::Exclusive { .. }) => {
				return Err(LockError::HeldExclusively {
					name: name.to_string(),
				});
			}
			None => {}
		}

		let file = self.lock_file(name, FlockOperation::NonBlockingLockShared)?;
		debug!(lock = name, "acquired shared lock");
		held.insert(name.to_string(), Held::Shared { _file: file, holders: 1 });
		Ok(())
	}

	fn acquire_exclusive_lock(&self, name: &str) -> Result<(), LockError> {
		let mut held = self.held.lock();
		match held.get(name) {
			Some(Held::Shared { holders, .. }) => {
				return Err(LockError::HeldShared {
					name: name.to_string(),
					holders: *holders,
				});
			}
			Some(Held::Exclusive { .. }) => {
				return Err(LockError::HeldExclusively {
					name: name.to_string(),
				});
			}
			None => {}
		}

		let file = self.lock_file(name, FlockOperation::NonBlockingLockExclusive)?;
		debug!(lock = name, "acquired exclusive lock");
		held.insert(name.to_string(), Held::Exclusive { _file: file });
		Ok(())
	}

	fn release_lock(&self, name: &str) -> Result<(), LockError> {
		let mut held = self.held.lock();
		let Some(entry) = held.get_mut(name) else {
			return Err(LockError::NotHeld {
				name: name.to_string(),
			});
		};

		if let Held::Shared { holders, .. } = entry
			&& *holders > 1
		{
			*holders -= 1;
			debug!(lock = name, remaining = *holders, "released shared hold");
			return Ok(());
		}

		// Dropping the file closes the descriptor, which drops the flock.
		held.remove(name);
		debug!(lock = name, "released lock");
		Ok(())
	}
}
